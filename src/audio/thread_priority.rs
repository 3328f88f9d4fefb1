// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Best effort scheduling priority for the latency sensitive threads: the
//! trigger engine and each audio callback.

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{debug, warn};

/// Default priority for audio callback threads when CLACKBOARD_THREAD_PRIORITY is unset.
pub const DEFAULT_CALLBACK_PRIORITY: u8 = 70;

/// Default priority for the trigger engine thread. Kept under the callbacks so
/// a flood of key events can't starve rendering.
pub const DEFAULT_ENGINE_PRIORITY: u8 = 60;

/// Reads CLACKBOARD_THREAD_PRIORITY (0-99), falling back to the given default.
/// Read once per thread so the hot path never touches the environment.
pub fn thread_priority(default: u8) -> Option<ThreadPriorityValue> {
    std::env::var("CLACKBOARD_THREAD_PRIORITY")
        .ok()
        .and_then(|v| parse_priority(&v))
        .or_else(|| ThreadPriorityValue::try_from(default).ok())
}

fn parse_priority(value: &str) -> Option<ThreadPriorityValue> {
    let n = value.trim().parse::<u8>().ok()?;
    if n >= 100 {
        return None;
    }
    ThreadPriorityValue::try_from(n).ok()
}

pub(crate) fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| {
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

/// Returns whether we should attempt RT (SCHED_FIFO) scheduling.
/// Default: enabled. Opt out with CLACKBOARD_DISABLE_RT=1.
pub fn rt_enabled() -> bool {
    !env_flag("CLACKBOARD_DISABLE_RT")
}

/// Raises the calling thread's priority. Failures are logged and otherwise ignored.
pub fn raise_current_thread(role: &str, priority: Option<ThreadPriorityValue>, rt: bool) {
    let Some(priority) = priority else {
        return;
    };
    let tp = ThreadPriority::Crossplatform(priority);
    if let Err(e) = set_current_thread_priority(tp) {
        debug!(role, error = ?e, "Unable to raise thread priority");
    }

    #[cfg(unix)]
    if rt {
        use thread_priority::unix::{
            set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
            ThreadSchedulePolicy,
        };
        let tid = thread_native_id();
        match set_thread_priority_and_policy(
            tid,
            tp,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        ) {
            Ok(()) => debug!(role, "Enabled RT SCHED_FIFO"),
            Err(e) => warn!(role, error = %e, "Failed to set RT SCHED_FIFO"),
        }
    }

    #[cfg(not(unix))]
    let _ = rt;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_priority() {
        assert!(parse_priority("42").is_some());
        assert!(parse_priority(" 7 ").is_some());
        assert!(parse_priority("100").is_none());
        assert!(parse_priority("-1").is_none());
        assert!(parse_priority("high").is_none());
    }

    #[test]
    fn test_default_priority_is_valid() {
        assert!(ThreadPriorityValue::try_from(DEFAULT_CALLBACK_PRIORITY).is_ok());
        assert!(ThreadPriorityValue::try_from(DEFAULT_ENGINE_PRIORITY).is_ok());
    }
}
