//! 主线程调度器单元测试
//!
//! 测试任务提交、按 tick 执行、队列上限和异常转换

use std::sync::Arc;

use parking_lot::Mutex;

use crate::runtime::error::{CallResult, ErrorKind, MethodError};
use crate::runtime::scheduler::{
    MainThread, SchedulerConfig, SchedulerError, TaskCompletion, TaskId, TaskState,
};
use crate::runtime::value::Value;

type Outcomes = Arc<Mutex<Vec<(TaskId, CallResult<Vec<Value>>)>>>;

fn recorder() -> (Outcomes, impl Fn() -> TaskCompletion) {
    let outcomes: Outcomes = Arc::new(Mutex::new(Vec::new()));
    let sink = outcomes.clone();
    (outcomes, move || -> TaskCompletion {
        let sink = sink.clone();
        Box::new(move |id: TaskId, result: CallResult<Vec<Value>>| {
            sink.lock().push((id, result))
        })
    })
}

#[cfg(test)]
mod task_id_tests {
    use super::*;

    #[test]
    fn test_task_id_display() {
        assert_eq!(TaskId(7).to_string(), "Task(7)");
        assert_eq!(Value::from(TaskId(7)), Value::Int(7));
    }

    #[test]
    fn test_task_state_round_trip() {
        for state in [
            TaskState::Queued,
            TaskState::Running,
            TaskState::Finished,
            TaskState::Failed,
        ] {
            assert_eq!(TaskState::from_u8(state.as_u8()), state);
        }
    }
}

#[cfg(test)]
mod main_thread_tests {
    use super::*;

    #[test]
    fn test_tasks_run_only_on_tick() {
        let main = MainThread::new();
        let (outcomes, completion) = recorder();
        let id = main
            .handle()
            .enqueue(|| Ok(vec![Value::Int(1)]), completion())
            .unwrap();

        assert!(outcomes.lock().is_empty());
        assert_eq!(main.pending(), 1);
        assert_eq!(main.tick(), 1);

        let outcomes = outcomes.lock();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].0, id);
        assert_eq!(outcomes[0].1, Ok(vec![Value::Int(1)]));
        assert_eq!(main.stats().completed(), 1);
    }

    #[test]
    fn test_ids_are_distinct() {
        let main = MainThread::new();
        let handle = main.handle();
        let (_, completion) = recorder();
        let a = handle.enqueue(|| Ok(vec![]), completion()).unwrap();
        let b = handle.enqueue(|| Ok(vec![]), completion()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tick_is_bounded() {
        let main = MainThread::with_config(SchedulerConfig {
            max_pending_tasks: 16,
            max_tasks_per_tick: 2,
        });
        let (outcomes, completion) = recorder();
        for _ in 0..5 {
            main.handle().enqueue(|| Ok(vec![]), completion()).unwrap();
        }
        assert_eq!(main.tick(), 2);
        assert_eq!(main.tick(), 2);
        assert_eq!(main.tick(), 1);
        assert_eq!(main.tick(), 0);
        assert_eq!(outcomes.lock().len(), 5);
    }

    #[test]
    fn test_queue_full() {
        let main = MainThread::with_config(SchedulerConfig {
            max_pending_tasks: 1,
            max_tasks_per_tick: 8,
        });
        let (_, completion) = recorder();
        main.handle().enqueue(|| Ok(vec![]), completion()).unwrap();
        let err = main
            .handle()
            .enqueue(|| Ok(vec![]), completion())
            .unwrap_err();
        assert_eq!(err, SchedulerError::QueueFull);
        assert_eq!(MethodError::from(err).message(), "Too many tasks");
    }

    #[test]
    fn test_errors_and_panics_are_reported() {
        let main = MainThread::new();
        let (outcomes, completion) = recorder();
        let handle = main.handle();
        handle
            .enqueue(|| Err(MethodError::new("nope")), completion())
            .unwrap();
        handle
            .enqueue(|| panic!("exploded"), completion())
            .unwrap();
        main.tick();

        let outcomes = outcomes.lock();
        assert_eq!(outcomes[0].1.as_ref().unwrap_err().message(), "nope");
        assert_eq!(
            outcomes[1].1.as_ref().unwrap_err().kind(),
            &ErrorKind::HostFault("exploded".to_string())
        );
        assert_eq!(main.stats().failed(), 2);
    }
}
