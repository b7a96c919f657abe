//! Mounts made by peripherals

use std::sync::Arc;

use periphery::apis::{ApiEnvironment, ComputerSide};
use periphery::devices::{Disk, DiskDrive};
use periphery::filesystem::{ComboMount, MemoryMount, Mount, WritableMount};
use periphery::runtime::Value;
use periphery::{boot, BridgeConfig, Computer};

fn disk(
    id: u32,
    file: &str,
) -> Disk {
    let disk = Disk::new(id);
    disk.contents.write(file, b"hello").unwrap();
    disk
}

fn mount_path(
    c: &mut Computer,
    side: &str,
) -> Value {
    let args = vec![Value::from(side), Value::from("getMountPath")];
    let mut values = c
        .vm_mut()
        .call("peripheral", "call", args, 0)
        .unwrap()
        .unwrap()
        .unwrap();
    values.remove(0)
}

#[test]
fn test_disk_mounted_while_attached() {
    let mut c = boot(BridgeConfig::default());
    let drive = Arc::new(DiskDrive::new());
    drive.insert(disk(1, "readme.txt"));
    c.peripherals()
        .set_peripheral(ComputerSide::Left, Some(drive.clone()));

    let fs = c.vm().environment().file_system();
    assert_eq!(fs.read("disk/readme.txt").unwrap(), b"hello".to_vec());
    assert_eq!(fs.mount_label("disk/readme.txt"), Some("disk".to_string()));
    assert_eq!(mount_path(&mut c, "left"), Value::from("disk"));

    c.peripherals().set_peripheral(ComputerSide::Left, None);
    let fs = c.vm().environment().file_system();
    assert!(!fs.exists("disk/readme.txt"));
    assert!(fs.locations().is_empty());
}

#[test]
fn test_second_drive_gets_next_location() {
    let mut c = boot(BridgeConfig::default());
    for (side, id) in [(ComputerSide::Left, 1), (ComputerSide::Right, 2)] {
        let drive = Arc::new(DiskDrive::new());
        drive.insert(disk(id, "id.txt"));
        c.peripherals().set_peripheral(side, Some(drive));
    }
    assert_eq!(mount_path(&mut c, "left"), Value::from("disk"));
    assert_eq!(mount_path(&mut c, "right"), Value::from("disk2"));
}

#[test]
fn test_insert_and_eject_while_attached() {
    let mut c = boot(BridgeConfig::default());
    let drive = Arc::new(DiskDrive::new());
    c.peripherals()
        .set_peripheral(ComputerSide::Top, Some(drive.clone()));
    c.vm().environment().drain_events();
    assert_eq!(mount_path(&mut c, "top"), Value::Nil);

    drive.insert(disk(9, "a.txt"));
    assert!(c.vm().environment().file_system().exists("disk/a.txt"));

    let ejected = drive.eject().unwrap();
    assert_eq!(ejected.id, 9);
    assert!(!c.vm().environment().file_system().exists("disk/a.txt"));
    assert_eq!(
        c.vm().environment().drain_events(),
        vec![
            vec![Value::from("disk"), Value::from("top")],
            vec![Value::from("disk_eject"), Value::from("top")],
        ]
    );
}

#[test]
fn test_combo_mount_as_rom() {
    let c = boot(BridgeConfig::default());
    let base: Arc<dyn Mount> = Arc::new(
        MemoryMount::new()
            .with_file("programs/edit", "base edit")
            .with_file("programs/ls", "base ls"),
    );
    let overlay: Arc<dyn Mount> =
        Arc::new(MemoryMount::new().with_file("programs/edit", "patched edit"));
    let fs = c.vm().environment().file_system();
    fs.mount("rom", "rom", Arc::new(ComboMount::new(vec![base, overlay])))
        .unwrap();

    assert_eq!(fs.read("rom/programs/edit").unwrap(), b"patched edit".to_vec());
    let mut listing = fs.list("rom/programs").unwrap();
    listing.sort();
    assert_eq!(listing, vec!["edit".to_string(), "ls".to_string()]);
    assert!(fs.write("rom/programs/ls", b"x").is_err());
}
