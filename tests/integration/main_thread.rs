//! Main thread redirection

use std::sync::Arc;

use once_cell::sync::Lazy;
use periphery::apis::{ComputerSide, Peripheral, TASK_COMPLETE_EVENT};
use periphery::bridge::{ClassDecl, Declared, MethodDecl};
use periphery::devices::{Disk, DiskDrive, Sensor};
use periphery::runtime::scheduler::TaskId;
use periphery::runtime::{MethodResult, ScriptError, Value};
use periphery::vm::ThreadStatus;
use periphery::{boot, BridgeConfig, Computer};

fn call_args(
    side: &str,
    method: &str,
) -> Vec<Value> {
    vec![Value::from(side), Value::from(method)]
}

fn with_sensor(config: BridgeConfig) -> Computer {
    let computer = boot(config);
    computer.peripherals().set_peripheral(
        ComputerSide::Left,
        Some(Arc::new(Sensor::new(["minecraft:sheep"]))),
    );
    computer.vm().environment().drain_events();
    computer
}

#[test]
fn test_scan_waits_for_tick() {
    let mut c = with_sensor(BridgeConfig::default());
    let id = c
        .vm_mut()
        .spawn("peripheral", "call", call_args("left", "scan"))
        .unwrap();
    assert_eq!(
        c.vm().thread(id).unwrap().status(),
        ThreadStatus::Parked(Some(TASK_COMPLETE_EVENT.to_string()))
    );

    assert_eq!(c.vm_mut().tick(), 1);
    assert_eq!(
        c.vm_mut().take_result(id).unwrap(),
        Some(Ok(vec![Value::list([Value::from("minecraft:sheep")])]))
    );
}

#[test]
fn test_tasks_per_tick_bound() {
    let config = BridgeConfig {
        max_tasks_per_tick: 1,
        ..BridgeConfig::default()
    };
    let mut c = with_sensor(config);
    let first = c
        .vm_mut()
        .spawn("peripheral", "call", call_args("left", "scan"))
        .unwrap();
    let second = c
        .vm_mut()
        .spawn("peripheral", "call", call_args("left", "scan"))
        .unwrap();

    assert_eq!(c.vm_mut().tick(), 1);
    assert!(c.vm().thread(first).unwrap().is_done());
    assert!(!c.vm().thread(second).unwrap().is_done());

    assert_eq!(c.vm_mut().tick(), 1);
    assert!(c.vm().thread(second).unwrap().is_done());
}

#[test]
fn test_queue_full() {
    let config = BridgeConfig {
        max_pending_tasks: 1,
        ..BridgeConfig::default()
    };
    let mut c = with_sensor(config);
    c.vm_mut()
        .spawn("peripheral", "call", call_args("left", "scan"))
        .unwrap();
    let result = c
        .vm_mut()
        .call("peripheral", "call", call_args("left", "scan"), 0)
        .unwrap();
    assert_eq!(result, Some(Err(ScriptError::new("Too many tasks", 0))));
}

#[test]
fn test_disk_label_set_on_main_thread() {
    let mut c = boot(BridgeConfig::default());
    let drive = Arc::new(DiskDrive::new());
    drive.insert(Disk::new(4).with_label("backup"));
    c.peripherals()
        .set_peripheral(ComputerSide::Bottom, Some(drive.clone()));

    let mut args = call_args("bottom", "setDiskLabel");
    args.push(Value::from("archive"));
    assert_eq!(
        c.vm_mut().call("peripheral", "call", args, 4).unwrap(),
        Some(Ok(vec![]))
    );
    assert_eq!(
        c.vm_mut()
            .call("peripheral", "call", call_args("bottom", "getDiskLabel"), 0)
            .unwrap(),
        Some(Ok(vec![Value::from("archive")]))
    );
    assert_eq!(
        c.vm_mut()
            .call("peripheral", "call", call_args("bottom", "getDiskID"), 0)
            .unwrap(),
        Some(Ok(vec![Value::Int(4)]))
    );
}

struct Impatient;

static IMPATIENT: Lazy<ClassDecl> = Lazy::new(|| {
    ClassDecl::new::<Impatient>("Impatient").method(
        MethodDecl::instance("wait", |_call| {
            Ok(MethodResult::pull_event(None, |_: Vec<Value>| Ok(MethodResult::of())))
        })
        .main_thread(),
    )
});

impl Declared for Impatient {
    fn declaration(&self) -> &'static ClassDecl {
        &IMPATIENT
    }
}

impl Peripheral for Impatient {
    fn get_type(&self) -> &str {
        "impatient"
    }
}

#[test]
fn test_main_thread_method_cannot_suspend() {
    let mut c = boot(BridgeConfig::default());
    c.peripherals()
        .set_peripheral(ComputerSide::Back, Some(Arc::new(Impatient)));
    c.vm().environment().drain_events();

    let result = c
        .vm_mut()
        .call("peripheral", "call", call_args("back", "wait"), 4)
        .unwrap();
    assert_eq!(
        result,
        Some(Err(ScriptError::new("Cannot suspend from a main thread method", 0)))
    );
}

#[test]
fn test_issue_task_queues_completion_event() {
    let c = boot(BridgeConfig::default());
    let id = c
        .vm()
        .context()
        .issue_main_thread_task(|| Ok(vec![Value::Int(1), Value::Int(2)]))
        .unwrap();
    assert_eq!(c.vm().main_thread().tick(), 1);
    assert_eq!(
        c.vm().environment().pop_event(),
        Some(vec![
            Value::from(TASK_COMPLETE_EVENT),
            Value::from(id),
            Value::Bool(true),
            Value::Int(1),
            Value::Int(2),
        ])
    );
    assert_ne!(id, TaskId(0));
}
