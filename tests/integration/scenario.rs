//! Speaker scenario
//!
//! A speaker attached on top, called through `peripheral.call` the way a
//! script would.

use std::sync::Arc;

use periphery::apis::ComputerSide;
use periphery::devices::Speaker;
use periphery::runtime::{ScriptError, Value};
use periphery::{boot, BridgeConfig};

fn call(
    computer: &mut periphery::Computer,
    args: &[&str],
) -> Result<Vec<Value>, ScriptError> {
    let args = args.iter().map(|a| Value::from(*a)).collect();
    computer
        .vm_mut()
        .call("peripheral", "call", args, 4)
        .unwrap()
        .unwrap()
}

#[test]
fn test_speaker_scenario() {
    let mut computer = boot(BridgeConfig::default());
    let speaker = Arc::new(Speaker::new());
    computer
        .peripherals()
        .set_peripheral(ComputerSide::Top, Some(speaker.clone()));

    assert_eq!(
        call(&mut computer, &["top", "playNote", "bell"]),
        Ok(vec![Value::Bool(true)])
    );
    let played = speaker.played();
    assert_eq!(played.len(), 1);
    assert_eq!(played[0].name, "note.bell");
    assert_eq!(played[0].volume, 1.0);

    let err = call(&mut computer, &["top", "playNote"]).unwrap_err();
    assert_eq!(err.message, "bad argument #1 (expected string, got nil)");

    computer.peripherals().set_peripheral(ComputerSide::Top, None);
    let err = call(&mut computer, &["top", "playNote", "bell"]).unwrap_err();
    assert_eq!(err.message, "No peripheral attached");
}

#[test]
fn test_speaker_scenario_after_stop() {
    let computer = boot(BridgeConfig::default());
    let api = computer.peripherals().clone();
    api.set_peripheral(ComputerSide::Top, Some(Arc::new(Speaker::new())));
    api.stop();

    let context = computer.vm().context().clone();
    let args = vec![Value::from("top"), Value::from("playNote"), Value::from("bell")];
    let err = api.call(&context, &args.into()).unwrap_err();
    assert_eq!(err.message(), "Peripheral is not attached");
}

#[test]
fn test_unknown_instrument() {
    let mut computer = boot(BridgeConfig::default());
    computer
        .peripherals()
        .set_peripheral(ComputerSide::Top, Some(Arc::new(Speaker::new())));
    let err = call(&mut computer, &["top", "playNote", "kazoo"]).unwrap_err();
    assert_eq!(err.message, "bad argument #1 (unknown option kazoo)");
    assert_eq!(err.level, 0);
}
