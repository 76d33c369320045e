//! Run conditions for background work and how the host checks them.

/// Conditions that must hold before a periodic job may run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Constraints {
    pub require_network: bool,
    pub require_charging: bool,
}

impl Constraints {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_satisfied(&self, device: &dyn DeviceState) -> bool {
        (!self.require_network || device.network_available())
            && (!self.require_charging || device.charging())
    }
}

/// What the machine currently looks like to the scheduler.
pub trait DeviceState: Send + Sync {
    fn network_available(&self) -> bool;
    fn charging(&self) -> bool;
}

/// Reports every condition as met.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysReady;

impl DeviceState for AlwaysReady {
    fn network_available(&self) -> bool {
        true
    }

    fn charging(&self) -> bool {
        true
    }
}

/// Reads network and power state from Linux sysfs.
///
/// Non-Linux hosts report every condition as met.
#[derive(Debug, Clone)]
pub struct SystemDeviceState {
    net_dir: std::path::PathBuf,
    power_dir: std::path::PathBuf,
}

impl Default for SystemDeviceState {
    fn default() -> Self {
        Self {
            net_dir: "/sys/class/net".into(),
            power_dir: "/sys/class/power_supply".into(),
        }
    }
}

impl SystemDeviceState {
    /// Reads from alternate directories laid out like `/sys/class/net` and
    /// `/sys/class/power_supply`.
    pub fn with_roots(net_dir: impl Into<std::path::PathBuf>, power_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            net_dir: net_dir.into(),
            power_dir: power_dir.into(),
        }
    }

    fn read_attr(dir: &std::path::Path, attr: &str) -> Option<String> {
        std::fs::read_to_string(dir.join(attr))
            .ok()
            .map(|s| s.trim().to_string())
    }

    fn sysfs_network_up(&self) -> bool {
        let Ok(entries) = std::fs::read_dir(&self.net_dir) else {
            return false;
        };
        entries.flatten().any(|entry| {
            entry.file_name() != "lo"
                && Self::read_attr(&entry.path(), "operstate").as_deref() == Some("up")
        })
    }

    fn sysfs_charging(&self) -> bool {
        let Ok(entries) = std::fs::read_dir(&self.power_dir) else {
            // No power supply information, e.g. a desktop or VM
            return true;
        };

        let mut saw_battery = false;
        for entry in entries.flatten() {
            let path = entry.path();
            match Self::read_attr(&path, "type").as_deref() {
                Some("Mains") | Some("USB") => {
                    if Self::read_attr(&path, "online").as_deref() == Some("1") {
                        return true;
                    }
                }
                Some("Battery") => {
                    saw_battery = true;
                    if matches!(
                        Self::read_attr(&path, "status").as_deref(),
                        Some("Charging") | Some("Full")
                    ) {
                        return true;
                    }
                }
                _ => {}
            }
        }
        !saw_battery
    }
}

impl DeviceState for SystemDeviceState {
    fn network_available(&self) -> bool {
        if cfg!(target_os = "linux") {
            self.sysfs_network_up()
        } else {
            true
        }
    }

    fn charging(&self) -> bool {
        if cfg!(target_os = "linux") {
            self.sysfs_charging()
        } else {
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    struct Fixed {
        network: bool,
        charging: bool,
    }

    impl DeviceState for Fixed {
        fn network_available(&self) -> bool {
            self.network
        }
        fn charging(&self) -> bool {
            self.charging
        }
    }

    #[test]
    fn test_constraints_check_only_what_they_require() {
        let offline = Fixed { network: false, charging: true };
        let on_battery = Fixed { network: true, charging: false };

        assert!(Constraints::none().is_satisfied(&offline));
        assert!(!Constraints { require_network: true, require_charging: false }.is_satisfied(&offline));
        assert!(Constraints { require_network: true, require_charging: false }.is_satisfied(&on_battery));
        assert!(!Constraints { require_network: true, require_charging: true }.is_satisfied(&on_battery));
        assert!(Constraints { require_network: true, require_charging: true }.is_satisfied(&AlwaysReady));
    }

    fn sysfs_root(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("podsync_sysfs_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(root.join("net")).unwrap();
        std::fs::create_dir_all(root.join("power")).unwrap();
        root
    }

    fn write_attr(dir: &Path, attr: &str, value: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(attr), format!("{value}\n")).unwrap();
    }

    #[test]
    fn test_loopback_alone_is_not_network() {
        let root = sysfs_root("lo_only");
        write_attr(&root.join("net/lo"), "operstate", "unknown");
        let device = SystemDeviceState::with_roots(root.join("net"), root.join("power"));
        assert!(!device.sysfs_network_up());

        write_attr(&root.join("net/eth0"), "operstate", "up");
        assert!(device.sysfs_network_up());
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_battery_discharging_is_not_charging() {
        let root = sysfs_root("discharging");
        write_attr(&root.join("power/BAT0"), "type", "Battery");
        write_attr(&root.join("power/BAT0"), "status", "Discharging");
        write_attr(&root.join("power/AC"), "type", "Mains");
        write_attr(&root.join("power/AC"), "online", "0");
        let device = SystemDeviceState::with_roots(root.join("net"), root.join("power"));
        assert!(!device.sysfs_charging());

        write_attr(&root.join("power/AC"), "online", "1");
        assert!(device.sysfs_charging());
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_no_battery_counts_as_charging() {
        let root = sysfs_root("desktop");
        let device = SystemDeviceState::with_roots(root.join("net"), root.join("power"));
        assert!(device.sysfs_charging());

        let missing = SystemDeviceState::with_roots(root.join("absent"), root.join("absent"));
        assert!(missing.sysfs_charging());
        assert!(!missing.sysfs_network_up());
        std::fs::remove_dir_all(&root).ok();
    }
}
