use proptest::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use vibeexpr::decimal::{Decimal, DecimalStatus};
use vibeexpr::expression::{
    CastTarget, EvalContext, ExpressionError, Item, SlotKind, TypeAttributes,
};
use vibeexpr::overflow::unsigned_sum_overflows;
use vibeexpr::server::{ServerConfig, ServerContext};
use vibeexpr::session::{ConditionCode, Session, SessionConfig, SqlMode};
use vibeexpr::value::{ResultType, Value};

fn server() -> Arc<ServerContext> {
    ServerContext::init(ServerConfig {
        kill_poll_interval: Duration::from_millis(10),
        ..ServerConfig::default()
    })
}

fn evaluate(item: &mut Item, session: &mut Session) -> Result<Value, ExpressionError> {
    item.fix_fields(session)?;
    let mut ctx = EvalContext::new(session);
    item.eval(&mut ctx)
}

fn unsigned(v: u64) -> Item {
    Item::cast(Item::uint(v), CastTarget::Unsigned)
}

proptest! {
    #[test]
    fn prop_unsigned_sum_overflow_guard(a in any::<u64>(), b in any::<u64>()) {
        let exceeds = (a as u128) + (b as u128) > u64::MAX as u128;
        prop_assert_eq!(unsigned_sum_overflows(a, b), exceeds);
    }

    #[test]
    fn prop_decimal_text_round_trip(
        negative in any::<bool>(),
        int_part in "[1-9][0-9]{0,20}",
        frac_part in "[0-9]{0,30}",
    ) {
        let mut text = String::new();
        if negative {
            text.push('-');
        }
        text.push_str(&int_part);
        if !frac_part.is_empty() {
            text.push('.');
            text.push_str(&frac_part);
        }
        let (d, status) = Decimal::parse(&text);
        prop_assert_eq!(status, DecimalStatus::Ok);
        let (again, status) = Decimal::parse(&d.to_string());
        prop_assert_eq!(status, DecimalStatus::Ok);
        prop_assert_eq!(again.to_string(), d.to_string());
        prop_assert_eq!(again.scale(), d.scale());
        prop_assert_eq!(again, d);
    }
}

#[test]
fn test_type_promotion() {
    let server = server();
    let mut s = server.new_session(SessionConfig::default());

    let mut item = Item::plus(Item::int(1), Item::int(1));
    assert_eq!(evaluate(&mut item, &mut s).unwrap(), Value::Int(2));
    assert_eq!(item.result_type(), ResultType::Int);
    assert!(!item.attrs().unsigned);

    let mut item = Item::plus(Item::int(1), Item::real(1.5));
    assert_eq!(evaluate(&mut item, &mut s).unwrap(), Value::Real(2.5));
    assert_eq!(item.result_type(), ResultType::Real);

    let mut item = Item::plus(
        Item::int(1),
        Item::cast(Item::int(1), CastTarget::Decimal { precision: 5, scale: 2 }),
    );
    assert_eq!(evaluate(&mut item, &mut s).unwrap().to_string(), "2.00");
    assert_eq!(item.result_type(), ResultType::Decimal);
    assert_eq!(item.attrs().decimals, 2);
}

#[test]
fn test_null_propagation_without_warnings() {
    let server = server();
    let mut s = server.new_session(SessionConfig::default().with_sql_mode(SqlMode::STRICT));
    let builders: Vec<fn(Item, Item) -> Item> = vec![
        Item::plus,
        Item::minus,
        Item::mul,
        Item::div,
        Item::int_div,
        Item::modulo,
    ];
    for build in builders {
        let mut left_null = build(Item::null(), Item::int(i64::MAX));
        assert_eq!(evaluate(&mut left_null, &mut s).unwrap(), Value::Null);
        let mut right_null = build(Item::int(i64::MAX), Item::null());
        assert_eq!(evaluate(&mut right_null, &mut s).unwrap(), Value::Null);
    }
    assert!(s.diagnostics().is_empty());
}

#[test]
fn test_greatest_mixed_signedness() {
    let server = server();
    let mut s = server.new_session(SessionConfig::default());
    let mut item = Item::greatest(vec![Item::int(1), unsigned(u64::MAX)]);
    let value = evaluate(&mut item, &mut s).unwrap();
    assert_eq!(item.result_type(), ResultType::Decimal);
    assert_eq!(value.to_string(), "18446744073709551615");
}

#[test]
fn test_division_by_zero_modes() {
    let server = server();
    let mut lenient = server.new_session(SessionConfig::default());
    for mut item in [
        Item::div(Item::int(5), Item::int(0)),
        Item::int_div(Item::int(5), Item::int(0)),
        Item::modulo(Item::int(5), Item::int(0)),
    ] {
        assert_eq!(evaluate(&mut item, &mut lenient).unwrap(), Value::Null);
        assert!(item.attrs().nullable);
        let warning = lenient.diagnostics().last().unwrap();
        assert_eq!(warning.code, ConditionCode::DivisionByZero);
        assert_eq!(warning.code.code(), 1365);
    }
    assert_eq!(lenient.diagnostics().total(), 3);

    let config = SessionConfig::default().with_sql_mode(SqlMode::ERROR_FOR_DIVISION_BY_ZERO);
    let mut strict = server.new_session(config);
    let mut item = Item::div(Item::int(5), Item::int(0));
    assert_eq!(
        evaluate(&mut item, &mut strict),
        Err(ExpressionError::DivisionByZero)
    );
}

#[test]
fn test_negation_boundary() {
    let server = server();
    let mut s = server.new_session(SessionConfig::default());
    let mut item = Item::neg(Item::int(i64::MIN));
    let value = evaluate(&mut item, &mut s).unwrap();
    assert_eq!(item.result_type(), ResultType::Decimal);
    assert_eq!(value.to_string(), "9223372036854775808");
    assert!(s.diagnostics().is_empty());
}

#[test]
fn test_idempotent_type_resolution() {
    let server = server();
    let mut s = server.new_session(SessionConfig::default());
    let mut item = Item::mul(Item::decimal("1.5").unwrap(), Item::call("pi", vec![]).unwrap());
    item.fix_fields(&mut s).unwrap();
    let attrs = *item.attrs();
    item.fix_fields(&mut s).unwrap();
    assert_eq!(*item.attrs(), attrs);
    assert!(item.is_fixed());
}

#[test]
fn test_overflow_warning_then_strict_error() {
    let server = server();
    let mut s = server.new_session(SessionConfig::default());
    let mut item = Item::plus(Item::int(i64::MAX), Item::int(1));
    assert_eq!(evaluate(&mut item, &mut s).unwrap(), Value::Null);
    let warning = s.diagnostics().last().unwrap();
    assert_eq!(warning.code, ConditionCode::DataOutOfRange);
    assert_eq!(
        warning.message,
        "BIGINT value is out of range in '(9223372036854775807 + 1)'"
    );

    let mut strict = server.new_session(SessionConfig::default().with_sql_mode(SqlMode::STRICT));
    let mut item = Item::plus(Item::int(i64::MAX), Item::int(1));
    assert!(matches!(
        evaluate(&mut item, &mut strict),
        Err(ExpressionError::NumericOutOfRange { type_name: "BIGINT", .. })
    ));
}

#[test]
fn test_subtracting_most_negative_bigint_overflows() {
    let server = server();
    let mut s = server.new_session(SessionConfig::default());
    let mut item = Item::minus(Item::int(0), Item::int(i64::MIN));
    assert_eq!(evaluate(&mut item, &mut s).unwrap(), Value::Null);
    assert_eq!(s.diagnostics().last().unwrap().code, ConditionCode::DataOutOfRange);

    let mut strict = server.new_session(SessionConfig::default().with_sql_mode(SqlMode::STRICT));
    let mut item = Item::minus(Item::int(0), Item::int(i64::MIN));
    assert!(matches!(
        evaluate(&mut item, &mut strict),
        Err(ExpressionError::NumericOutOfRange { type_name: "BIGINT", .. })
    ));
}

#[test]
fn test_columns_and_slots() {
    let server = server();
    let mut s = server.new_session(SessionConfig::default());
    let mut item = Item::plus(
        Item::column(0, "price", TypeAttributes::decimal(10, 2, false)),
        Item::slot(SlotKind::Subquery, 0, TypeAttributes::bigint(false)),
    );
    item.fix_fields(&mut s).unwrap();
    assert_eq!(item.result_type(), ResultType::Decimal);
    assert!(!item.is_const());

    let row = [Value::Decimal("19.99".parse().unwrap())];
    let slots = [Value::Int(1)];
    let mut ctx = EvalContext::with_row(&mut s, &row).with_slots(&slots);
    assert_eq!(item.eval(&mut ctx).unwrap().to_string(), "20.99");

    let mut ctx = EvalContext::new(&mut s);
    assert!(matches!(
        item.eval(&mut ctx),
        Err(ExpressionError::ColumnIndexOutOfBounds { index: 0, row_size: 0 })
    ));
}

#[test]
fn test_advisory_lock_reentrancy_across_sessions() {
    let server = server();
    let mut owner = server.new_session(SessionConfig::default());
    let mut other = server.new_session(SessionConfig::default());
    let get_lock = |timeout: i64| {
        Item::call("get_lock", vec![Item::string("resource"), Item::int(timeout)]).unwrap()
    };
    let release = || Item::call("release_lock", vec![Item::string("resource")]).unwrap();

    assert_eq!(evaluate(&mut get_lock(0), &mut owner).unwrap(), Value::Int(1));
    assert_eq!(evaluate(&mut get_lock(0), &mut owner).unwrap(), Value::Int(1));

    let started = Instant::now();
    assert_eq!(evaluate(&mut get_lock(0), &mut other).unwrap(), Value::Int(0));
    assert!(started.elapsed() < Duration::from_secs(1));

    assert_eq!(evaluate(&mut release(), &mut owner).unwrap(), Value::Int(1));
    assert_eq!(evaluate(&mut get_lock(0), &mut other).unwrap(), Value::Int(0));
    assert_eq!(evaluate(&mut release(), &mut owner).unwrap(), Value::Int(1));
    assert_eq!(evaluate(&mut get_lock(0), &mut other).unwrap(), Value::Int(1));
}

#[test]
fn test_lock_waiter_is_granted_on_release() {
    let server = server();
    let mut owner = server.new_session(SessionConfig::default());
    let mut waiter = server.new_session(SessionConfig::default());
    let lock = |timeout: i64| {
        Item::call("get_lock", vec![Item::string("queue"), Item::int(timeout)]).unwrap()
    };
    assert_eq!(evaluate(&mut lock(0), &mut owner).unwrap(), Value::Int(1));

    let handle = thread::spawn(move || {
        let value = evaluate(&mut lock(10), &mut waiter);
        (value, waiter)
    });
    thread::sleep(Duration::from_millis(30));
    drop(owner);
    let (value, waiter) = handle.join().unwrap();
    assert_eq!(value.unwrap(), Value::Int(1));
    assert_eq!(
        server.user_locks().query_owner(
            &vibeexpr::concurrency::LockKey::user_level("queue").unwrap()
        ),
        Some(waiter.id())
    );
}

#[test]
fn test_reset_and_refix_with_new_session_settings() {
    let server = server();
    let mut s = server.new_session(SessionConfig::default());
    let mut item = Item::div(Item::int(1), Item::int(3));
    assert_eq!(evaluate(&mut item, &mut s).unwrap().to_string(), "0.3333");

    let mut wide = server.new_session(SessionConfig {
        div_precision_increment: 8,
        ..SessionConfig::default()
    });
    item.reset();
    assert_eq!(evaluate(&mut item, &mut wide).unwrap().to_string(), "0.33333333");
}
