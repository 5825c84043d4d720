use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use crate::subprocess::Tool;

/// Grace period between SIGTERM and SIGKILL when tearing down a session's
/// process tree.
const KILL_GRACE: Duration = Duration::from_millis(2000);

/// Pause after pasting a nudge before submitting it.
const NUDGE_PASTE_DELAY: Duration = Duration::from_millis(500);

/// Terminal-multiplexer sessions hosting agents.
pub trait SessionManager {
    /// Whether the named session exists.
    fn exists(&self, session: &str) -> anyhow::Result<bool>;

    /// Deliver a message to the agent's prompt immediately. This must not go
    /// through any queued channel: health probes time the response, and a
    /// deferred delivery would starve the timeout.
    fn nudge(&self, session: &str, message: &str) -> anyhow::Result<()>;

    /// Kill the session and every descendant process, leaving no orphans.
    fn kill_with_processes(&self, session: &str) -> anyhow::Result<()>;
}

/// tmux-backed sessions.
pub struct TmuxSessions {
    tmux: String,
}

impl TmuxSessions {
    pub fn new(tmux: &str) -> Self {
        Self {
            tmux: tmux.to_string(),
        }
    }

    fn tool(&self) -> Tool {
        Tool::new(&self.tmux).timeout(Duration::from_secs(10))
    }

    fn pane_pid(&self, session: &str) -> Option<u32> {
        let output = self
            .tool()
            .args(&["display-message", "-p", "-t", session, "#{pane_pid}"])
            .run()
            .ok()?;
        if !output.success() {
            return None;
        }
        output.stdout.trim().parse().ok()
    }
}

impl SessionManager for TmuxSessions {
    fn exists(&self, session: &str) -> anyhow::Result<bool> {
        // Exact match: tmux treats the target as a prefix unless pinned with =
        let target = format!("={session}");
        let output = self.tool().args(&["has-session", "-t", &target]).run()?;
        Ok(output.success())
    }

    fn nudge(&self, session: &str, message: &str) -> anyhow::Result<()> {
        // Paste literally, then Escape (drops vim-mode INSERT if enabled,
        // harmless otherwise), then Enter to submit.
        self.tool()
            .args(&["send-keys", "-t", session, "-l", message])
            .run_ok()?;
        thread::sleep(NUDGE_PASTE_DELAY);
        self.tool()
            .args(&["send-keys", "-t", session, "Escape"])
            .run_ok()?;
        thread::sleep(Duration::from_millis(100));
        self.tool()
            .args(&["send-keys", "-t", session, "Enter"])
            .run_ok()?;
        Ok(())
    }

    fn kill_with_processes(&self, session: &str) -> anyhow::Result<()> {
        if let Some(pid) = self.pane_pid(session) {
            // Deepest-first so parents can't respawn or orphan children
            // between signals.
            let mut pids = descendants(pid);
            pids.push(pid);

            for p in &pids {
                let _ = Tool::new("kill").args(&["-TERM", &p.to_string()]).run();
            }
            thread::sleep(KILL_GRACE);
            for p in &pids {
                let _ = Tool::new("kill").args(&["-KILL", &p.to_string()]).run();
            }
        }

        // Killing the pane process may have already destroyed the session;
        // a failed kill-session on a gone session is fine.
        let target = format!("={session}");
        let _ = self.tool().args(&["kill-session", "-t", &target]).run();
        Ok(())
    }
}

/// All descendant PIDs of `root`, deepest first.
fn descendants(root: u32) -> Vec<u32> {
    let Ok(output) = Tool::new("ps").args(&["-eo", "pid=,ppid="]).run() else {
        return Vec::new();
    };
    if !output.success() {
        return Vec::new();
    }

    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    for line in output.stdout.lines() {
        let mut fields = line.split_whitespace();
        let (Some(pid), Some(ppid)) = (fields.next(), fields.next()) else {
            continue;
        };
        if let (Ok(pid), Ok(ppid)) = (pid.parse(), ppid.parse()) {
            children.entry(ppid).or_default().push(pid);
        }
    }

    let mut out = Vec::new();
    collect_descendants(&children, root, &mut out);
    out.reverse();
    out
}

fn collect_descendants(children: &HashMap<u32, Vec<u32>>, pid: u32, out: &mut Vec<u32>) {
    if let Some(kids) = children.get(&pid) {
        for &kid in kids {
            out.push(kid);
            collect_descendants(children, kid, out);
        }
    }
}
