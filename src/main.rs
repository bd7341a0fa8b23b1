//! vibeexpr - evaluates a showcase of typed SQL scalar expressions

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use log::info;
use vibeexpr::expression::{CastTarget, EvalContext, Item};
use vibeexpr::server::{ServerConfig, ServerContext};
use vibeexpr::session::{Session, SessionConfig, SqlMode};

/// vibeexpr - SQL scalar expression engine
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Turn numeric overflow warnings into errors
    #[arg(long)]
    strict: bool,

    /// Turn division by zero warnings into errors
    #[arg(long)]
    error_for_division_by_zero: bool,

    /// Make `-` on unsigned operands produce a signed result
    #[arg(long)]
    no_unsigned_subtraction: bool,

    /// Extra fractional digits produced by `/`
    #[arg(long, default_value = "4")]
    div_precision_increment: u8,

    /// Server id feeding UUID_SHORT()
    #[arg(long, default_value = "1")]
    server_id: u32,
}

impl Args {
    fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig {
            div_precision_increment: self.div_precision_increment,
            ..SessionConfig::default()
        };
        if self.strict {
            config.sql_mode.insert(SqlMode::STRICT);
        }
        if self.error_for_division_by_zero {
            config.sql_mode.insert(SqlMode::ERROR_FOR_DIVISION_BY_ZERO);
        }
        if self.no_unsigned_subtraction {
            config.sql_mode.insert(SqlMode::NO_UNSIGNED_SUBTRACTION);
        }
        config
    }
}

fn showcase() -> Result<Vec<Item>> {
    let unsigned = |v: i64| Item::cast(Item::int(v), CastTarget::Unsigned);
    Ok(vec![
        Item::plus(Item::int(1), Item::decimal("2.50")?),
        Item::div(Item::int(2), Item::int(3)),
        Item::div(Item::int(1), Item::int(0)),
        Item::plus(Item::int(i64::MAX), Item::int(1)),
        Item::minus(unsigned(1), unsigned(2)),
        Item::neg(Item::int(i64::MIN)),
        Item::mul(Item::real(1e300), Item::real(1e300)),
        Item::round(Item::decimal("2.5")?, Item::int(0)),
        Item::round(Item::real(2.5), Item::int(0)),
        Item::call("log", vec![Item::int(0)])?,
        Item::greatest(vec![Item::int(-1), unsigned(-1)]),
        Item::call("locate", vec![Item::string("bar"), Item::string("foobarbar"), Item::int(5)])?,
        Item::call("field", vec![Item::string("b"), Item::string("a"), Item::string("B")])?,
        Item::cast(Item::real(123.456), CastTarget::Decimal { precision: 4, scale: 2 }),
        Item::call("get_lock", vec![Item::string("showcase"), Item::int(0)])?,
        Item::call("is_used_lock", vec![Item::string("showcase")])?,
        Item::call("release_lock", vec![Item::string("showcase")])?,
        Item::call("uuid_short", vec![])?,
        Item::call("connection_id", vec![])?,
    ])
}

fn run(item: &mut Item, session: &mut Session) -> Result<()> {
    session.begin_statement();
    let text = item.to_string();
    item.fix_fields(session)
        .with_context(|| format!("Failed to resolve {}", text))?;
    let result = {
        let mut ctx = EvalContext::new(session);
        item.eval(&mut ctx)
    };
    match result {
        Ok(value) => println!("{:<55} {:<8} {}", text, item.result_type().as_str(), value),
        Err(e) => println!("{:<55} {:<8} ERROR: {}", text, item.result_type().as_str(), e),
    }
    for warning in session.diagnostics().warnings() {
        println!("    {}", warning);
    }
    item.cleanup();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let server = ServerContext::init(ServerConfig {
        server_id: args.server_id,
        ..ServerConfig::default()
    });
    let mut session = server.new_session(args.session_config());
    info!("session {} opened", session.id());

    for mut item in showcase()? {
        run(&mut item, &mut session)?;
    }

    drop(session);
    server.teardown();
    Ok(())
}
