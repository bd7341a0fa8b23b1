//! Session, lock and utility functions.
//!
//! Most of these read or change state outside the expression tree: the
//! session (connection id, random generator, kill flag) or the server
//! (advisory locks, the `UUID_SHORT()` counter).

use super::error::{ExpressionError, ExpressionResult};
use super::eval::EvalContext;
use super::function::MiscFunc;
use super::item::{Item, Node, TypeAttributes};
use crate::concurrency::{AcquireOutcome, RandState, WaitOutcome};
use crate::session::{ConditionCode, Session};
use crate::value::{Value, NOT_FIXED_DEC};
use log::{debug, info};
use std::time::Duration;

/// Shortest `SLEEP()` that actually waits, in seconds.
const MIN_SLEEP_SECS: f64 = 0.00001;

pub(super) fn resolve(f: MiscFunc, node: Node<'_>, session: &mut Session) -> ExpressionResult<()> {
    let nullable = node.attrs.nullable;
    let attrs = match f {
        MiscFunc::ConnectionId => TypeAttributes::int(10, true),
        MiscFunc::LastValue => {
            let last = node.args.len() - 1;
            node.args[last].attrs
        }
        MiscFunc::Benchmark => TypeAttributes::int(1, false).nullable(true),
        MiscFunc::Rand => {
            if node.args.is_empty() {
                session.record_rand_seed();
            }
            TypeAttributes::real(NOT_FIXED_DEC)
        }
        MiscFunc::GetLock | MiscFunc::ReleaseLock | MiscFunc::IsFreeLock => {
            TypeAttributes::int(1, false).nullable(true)
        }
        MiscFunc::IsUsedLock => TypeAttributes::int(10, true).nullable(true),
        MiscFunc::ReleaseAllLocks => TypeAttributes::int(10, true),
        MiscFunc::UuidShort => TypeAttributes::bigint(true),
        MiscFunc::Sleep => TypeAttributes::int(1, false).nullable(nullable),
    };
    *node.attrs = attrs;
    Ok(())
}

/// Lock name argument; NULL names make the function NULL.
fn lock_name(item: &mut Item, ctx: &mut EvalContext<'_>) -> ExpressionResult<Option<String>> {
    item.eval_str(ctx)
}

pub(super) fn evaluate(
    f: MiscFunc,
    node: Node<'_>,
    ctx: &mut EvalContext<'_>,
) -> ExpressionResult<Value> {
    match f {
        MiscFunc::ConnectionId => Ok(Value::UInt(ctx.session.id() as u64)),
        MiscFunc::LastValue => {
            let (last, rest) = node.args.split_last_mut().ok_or(ExpressionError::ArgumentCount {
                function: "last_value".to_string(),
                actual: 0,
            })?;
            for arg in rest.iter_mut() {
                arg.eval(ctx)?;
            }
            last.eval(ctx)
        }
        MiscFunc::Benchmark => evaluate_benchmark(node, ctx),
        MiscFunc::Rand => {
            let Some(arg) = node.args.first_mut() else {
                return Ok(Value::Real(ctx.session.rand_state().next_f64()));
            };
            // A constant seed is applied once; any other seed every row.
            if !arg.constant || !node.state.rand_seeded {
                let seed = arg.eval_int(ctx)?.unwrap_or(0) as u32;
                node.state.rand = Some(RandState::from_user_seed(seed));
                node.state.rand_seeded = true;
            }
            let rand = node
                .state
                .rand
                .get_or_insert_with(|| RandState::from_user_seed(0));
            Ok(Value::Real(rand.next_f64()))
        }
        MiscFunc::GetLock => {
            let Some(name) = lock_name(&mut node.args[0], ctx)? else {
                return Ok(Value::Null);
            };
            let timeout = match node.args[1].eval_real(ctx)? {
                Some(secs) if secs >= 0.0 => {
                    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
                }
                _ => {
                    ctx.session
                        .push_warning(ConditionCode::WrongArguments, "Incorrect arguments to get_lock");
                    return Ok(Value::Null);
                }
            };
            Ok(match ctx.session.get_user_lock(&name, timeout)? {
                AcquireOutcome::Granted => Value::Int(1),
                AcquireOutcome::Timeout => Value::Int(0),
                AcquireOutcome::Killed => Value::Null,
            })
        }
        MiscFunc::ReleaseLock => {
            let Some(name) = lock_name(&mut node.args[0], ctx)? else {
                return Ok(Value::Null);
            };
            Ok(match ctx.session.release_user_lock(&name)? {
                Some(released) => Value::Int(released as i64),
                None => Value::Null,
            })
        }
        MiscFunc::IsFreeLock => {
            let Some(name) = lock_name(&mut node.args[0], ctx)? else {
                return Ok(Value::Null);
            };
            let free = ctx.session.user_lock_owner(&name)?.is_none();
            Ok(Value::Int(free as i64))
        }
        MiscFunc::IsUsedLock => {
            let Some(name) = lock_name(&mut node.args[0], ctx)? else {
                return Ok(Value::Null);
            };
            Ok(ctx
                .session
                .user_lock_owner(&name)?
                .map_or(Value::Null, |owner| Value::UInt(owner as u64)))
        }
        MiscFunc::ReleaseAllLocks => Ok(Value::UInt(ctx.session.release_all_user_locks())),
        MiscFunc::UuidShort => Ok(Value::UInt(ctx.session.server().uuid_short().next())),
        MiscFunc::Sleep => evaluate_sleep(node, ctx),
    }
}

fn evaluate_benchmark(node: Node<'_>, ctx: &mut EvalContext<'_>) -> ExpressionResult<Value> {
    let Some(count) = node.args[0].eval_int_operand(ctx)? else {
        return Ok(Value::Null);
    };
    if count.is_negative() {
        ctx.session.push_warning(
            ConditionCode::WrongArguments,
            format!("Incorrect count value: '{}' for function benchmark", count.value),
        );
        return Ok(Value::Null);
    }
    let count = count.magnitude();
    debug!("benchmark: {} iterations of {}", count, node.args[1]);
    for _ in 0..count {
        if ctx.session.is_killed() {
            info!("benchmark interrupted in session {}", ctx.session.id());
            return Err(ExpressionError::Interrupted);
        }
        node.args[1].eval(ctx)?;
    }
    Ok(Value::Int(0))
}

fn evaluate_sleep(node: Node<'_>, ctx: &mut EvalContext<'_>) -> ExpressionResult<Value> {
    let Some(secs) = node.args[0].eval_real(ctx)? else {
        return Ok(Value::Null);
    };
    if secs < MIN_SLEEP_SECS {
        return Ok(Value::Int(0));
    }
    let duration = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
    let poll = ctx.session.server().config().kill_poll_interval;
    Ok(match ctx.session.kill_switch().wait(duration, poll) {
        WaitOutcome::Elapsed => Value::Int(0),
        WaitOutcome::Interrupted => Value::Int(1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{ServerConfig, ServerContext};
    use crate::session::SessionConfig;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn server() -> Arc<ServerContext> {
        ServerContext::init(ServerConfig {
            kill_poll_interval: Duration::from_millis(10),
            ..ServerConfig::default()
        })
    }

    fn call(name: &str, args: Vec<Item>, session: &mut Session) -> ExpressionResult<Value> {
        let mut item = Item::call(name, args)?;
        item.fix_fields(session)?;
        let mut ctx = EvalContext::new(session);
        item.eval(&mut ctx)
    }

    #[test]
    fn test_connection_id_and_last_value() {
        let server = server();
        let mut s = server.new_session(SessionConfig::default());
        let id = s.id() as u64;
        assert_eq!(call("connection_id", vec![], &mut s).unwrap(), Value::UInt(id));

        let mut item = Item::call(
            "last_value",
            vec![Item::div(Item::int(1), Item::int(0)), Item::string("x")],
        )
        .unwrap();
        item.fix_fields(&mut s).unwrap();
        assert_eq!(item.result_type(), crate::value::ResultType::String);
        let mut ctx = EvalContext::new(&mut s);
        assert_eq!(item.eval(&mut ctx).unwrap(), Value::String("x".to_string()));
        // The discarded argument was still evaluated.
        assert_eq!(s.diagnostics().total(), 1);
    }

    #[test]
    fn test_benchmark() {
        let server = server();
        let mut s = server.new_session(SessionConfig::default());
        let value = call("benchmark", vec![Item::int(100), Item::plus(Item::int(1), Item::int(1))], &mut s);
        assert_eq!(value.unwrap(), Value::Int(0));

        let value = call("benchmark", vec![Item::int(-1), Item::int(1)], &mut s);
        assert_eq!(value.unwrap(), Value::Null);
        assert_eq!(
            s.diagnostics().last().unwrap().code,
            ConditionCode::WrongArguments
        );

        s.kill_switch().kill();
        let value = call("benchmark", vec![Item::int(10), Item::int(1)], &mut s);
        assert_eq!(value, Err(ExpressionError::Interrupted));
    }

    #[test]
    fn test_rand_with_seed_is_repeatable() {
        let server = server();
        let mut s = server.new_session(SessionConfig::default());
        let mut first = Item::call("rand", vec![Item::int(3)]).unwrap();
        let mut second = Item::call("rand", vec![Item::int(3)]).unwrap();
        first.fix_fields(&mut s).unwrap();
        second.fix_fields(&mut s).unwrap();

        let mut ctx = EvalContext::new(&mut s);
        let a: Vec<Value> = (0..3).map(|_| first.eval(&mut ctx).unwrap()).collect();
        let b: Vec<Value> = (0..3).map(|_| second.eval(&mut ctx).unwrap()).collect();
        assert_eq!(a, b);
        assert_ne!(a[0], a[1]);

        // Per-execution cleanup forgets the seed.
        first.cleanup();
        assert_eq!(first.eval(&mut ctx).unwrap(), a[0]);
        assert!(s.take_rand_seed_event().is_none());
    }

    #[test]
    fn test_unseeded_rand_records_session_seed() {
        let server = server();
        let mut s = server.new_session(SessionConfig::default());
        let before = s.rand_state().seed();
        let value = call("rand", vec![], &mut s).unwrap();
        assert!(matches!(value, Value::Real(v) if (0.0..1.0).contains(&v)));
        let event = s.take_rand_seed_event().unwrap();
        assert_eq!(event.seed, before);
    }

    #[test]
    fn test_advisory_lock_functions() {
        let server = server();
        let mut a = server.new_session(SessionConfig::default());
        let mut b = server.new_session(SessionConfig::default());
        let name = || Item::string("Job");

        assert_eq!(call("get_lock", vec![name(), Item::int(0)], &mut a).unwrap(), Value::Int(1));
        assert_eq!(call("get_lock", vec![name(), Item::int(1)], &mut a).unwrap(), Value::Int(1));
        assert_eq!(call("get_lock", vec![Item::string("job"), Item::int(0)], &mut b).unwrap(), Value::Int(0));

        assert_eq!(call("is_free_lock", vec![name()], &mut b).unwrap(), Value::Int(0));
        assert_eq!(
            call("is_used_lock", vec![name()], &mut b).unwrap(),
            Value::UInt(a.id() as u64)
        );
        assert_eq!(call("release_lock", vec![name()], &mut b).unwrap(), Value::Int(0));
        assert_eq!(call("release_all_locks", vec![], &mut a).unwrap(), Value::UInt(2));
        assert_eq!(call("release_lock", vec![name()], &mut a).unwrap(), Value::Null);
        assert_eq!(call("is_used_lock", vec![name()], &mut a).unwrap(), Value::Null);
    }

    #[test]
    fn test_get_lock_arguments() {
        let server = server();
        let mut s = server.new_session(SessionConfig::default());
        assert_eq!(call("get_lock", vec![Item::null(), Item::int(1)], &mut s).unwrap(), Value::Null);
        assert_eq!(
            call("get_lock", vec![Item::string("x"), Item::int(-1)], &mut s).unwrap(),
            Value::Null
        );
        assert_eq!(
            s.diagnostics().last().unwrap().code,
            ConditionCode::WrongArguments
        );
        assert!(matches!(
            call("get_lock", vec![Item::string(""), Item::int(1)], &mut s),
            Err(ExpressionError::Lock(_))
        ));
        let long = "x".repeat(65);
        assert!(call("is_free_lock", vec![Item::string(&long)], &mut s).is_err());
    }

    #[test]
    fn test_killed_lock_wait_is_null() {
        let server = server();
        let mut owner = server.new_session(SessionConfig::default());
        let mut waiter = server.new_session(SessionConfig::default());
        call("get_lock", vec![Item::string("l"), Item::int(0)], &mut owner).unwrap();

        let kill = waiter.kill_switch();
        let handle = thread::spawn(move || {
            let value = call("get_lock", vec![Item::string("l"), Item::int(60)], &mut waiter);
            (value, waiter)
        });
        thread::sleep(Duration::from_millis(30));
        kill.kill();
        let (value, _waiter) = handle.join().unwrap();
        assert_eq!(value.unwrap(), Value::Null);
    }

    #[test]
    fn test_uuid_short_increments() {
        let server = server();
        let mut s = server.new_session(SessionConfig::default());
        let Value::UInt(first) = call("uuid_short", vec![], &mut s).unwrap() else {
            panic!("uuid_short is unsigned");
        };
        assert_eq!(call("uuid_short", vec![], &mut s).unwrap(), Value::UInt(first + 1));
    }

    #[test]
    fn test_sleep() {
        let server = server();
        let mut s = server.new_session(SessionConfig::default());
        assert_eq!(call("sleep", vec![Item::real(0.000001)], &mut s).unwrap(), Value::Int(0));
        assert_eq!(call("sleep", vec![Item::real(0.02)], &mut s).unwrap(), Value::Int(0));

        let kill = s.kill_switch();
        let started = Instant::now();
        let handle = thread::spawn(move || call("sleep", vec![Item::int(30)], &mut s));
        thread::sleep(Duration::from_millis(30));
        kill.kill();
        assert_eq!(handle.join().unwrap().unwrap(), Value::Int(1));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
