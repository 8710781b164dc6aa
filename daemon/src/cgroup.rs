use std::fs;

use tracing::debug;

/// Extracts the cgroup path from the contents of `/proc/PID/cgroup`.
///
/// The unified hierarchy (`0::/path`) wins; on hybrid setups the v1
/// `name=systemd` hierarchy is used instead.
pub fn parse_cgroup_file(contents: &str) -> Option<String> {
    let mut systemd = None;
    for line in contents.lines() {
        let mut fields = line.splitn(3, ':');
        let (Some(id), Some(controllers), Some(path)) = (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };

        if id == "0" && controllers.is_empty() {
            return Some(path.to_string());
        }
        if controllers == "name=systemd" {
            systemd = Some(path.to_string());
        }
    }
    systemd
}

pub fn read_process_cgroup(pid: i32) -> Option<String> {
    let path = format!("/proc/{pid}/cgroup");
    match fs::read_to_string(&path) {
        Ok(contents) => parse_cgroup_file(&contents),
        Err(err) => {
            debug!("failed to read {path}: {err}");
            None
        }
    }
}
