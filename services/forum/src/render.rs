//! Plain-text rendering of the view state

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::state::{NoticeLevel, ViewState};
use crate::thread_sync::{FocusedThread, TogglePhase};

const UNITS: [(i64, &str); 6] = [
    (31_536_000, "years"),
    (2_592_000, "months"),
    (604_800, "weeks"),
    (86_400, "days"),
    (3_600, "hours"),
    (60, "minutes"),
];

/// Age of `then` relative to `now`, e.g. "3 hours ago"
///
/// A unit is used only once strictly more than one of it has passed, so
/// exactly a minute reads "Just now" and exactly a day "24 hours ago".
pub fn time_since(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds();
    for (size, unit) in UNITS {
        if seconds > size {
            return format!("{} {} ago", seconds / size, unit);
        }
    }
    "Just now".to_string()
}

fn phase_note(phase: TogglePhase) -> &'static str {
    match phase {
        TogglePhase::Pending { .. } => " (saving)",
        TogglePhase::Failed => " (failed)",
        TogglePhase::Idle | TogglePhase::Reconciled => "",
    }
}

fn render_thread(out: &mut String, focused: &FocusedThread, now: DateTime<Utc>) {
    let snapshot = &focused.snapshot;
    let thread = &snapshot.thread;
    let _ = writeln!(out, "== [{}] {} ==", thread.id, thread.title);
    let _ = writeln!(
        out,
        "by user {} | {} | {} | {}",
        thread.creator_id,
        if thread.is_public { "public" } else { "private" },
        if thread.lock { "locked" } else { "open" },
        time_since(thread.created_at, now)
    );
    let _ = writeln!(out, "{}", thread.content);
    let _ = writeln!(
        out,
        "likes: {} [{}]{}  watching: [{}]{}{}",
        thread.likes.len(),
        if focused.liked() { "x" } else { " " },
        phase_note(focused.like),
        if focused.watched() { "x" } else { " " },
        phase_note(focused.watch),
        if snapshot.can_moderate { "  (you can edit)" } else { "" }
    );

    if snapshot.comments.is_empty() {
        let _ = writeln!(out, "No comments yet.");
        return;
    }
    let _ = writeln!(out, "Comments:");
    for (depth, node) in snapshot.comments.flatten() {
        let comment = &node.comment;
        let decor = snapshot.decor.get(&comment.id);
        let _ = writeln!(
            out,
            "{}#{} user {}{}, {}, {} like(s){}{}",
            "  ".repeat(depth + 1),
            comment.id,
            comment.creator_id,
            if decor.is_some_and(|d| d.author_image.is_some()) { " [img]" } else { "" },
            time_since(comment.created_at, now),
            comment.likes.len(),
            if node.liked_by_user { " *" } else { "" },
            if decor.is_some_and(|d| d.can_edit) { " [edit]" } else { "" },
        );
        let _ = writeln!(out, "{}  {}", "  ".repeat(depth + 1), comment.content);
    }
}

/// Render everything on screen
pub fn render(state: &ViewState, now: DateTime<Utc>) -> String {
    let mut out = String::new();

    match state.user_id {
        Some(id) => {
            let _ = writeln!(out, "Signed in as user {}", id);
        }
        None => {
            let _ = writeln!(out, "Not signed in. Try `login <email> <password>`.");
        }
    }

    if state.is_signed_in() {
        let focused = state.focused.as_ref().map(|f| f.snapshot.id());
        if state.threads.is_empty() {
            let _ = writeln!(out, "No threads.");
        }
        for thread in state.threads.iter() {
            let marker = if Some(thread.id) == focused { ">" } else { " " };
            let _ = writeln!(
                out,
                "{} [{}] {} ({} likes, {})",
                marker,
                thread.id,
                thread.title,
                thread.likes.len(),
                time_since(thread.created_at, now)
            );
        }
        if state.has_more {
            let _ = writeln!(out, "  ... `more` for older threads");
        }
    }

    if let Some(focused) = &state.focused {
        let _ = writeln!(out);
        render_thread(&mut out, focused, now);
    }

    if let Some(profile) = &state.profile {
        let user = &profile.user;
        let _ = writeln!(out);
        let _ = writeln!(out, "Profile #{}{}", user.id, if user.admin { " (admin)" } else { "" });
        let _ = writeln!(out, "  email: {}", user.email);
        let _ = writeln!(out, "  name: {}", user.name);
        let _ = writeln!(
            out,
            "  image: {}",
            match user.image.as_deref() {
                Some(image) if image.starts_with("data:") => "uploaded",
                Some(image) if !image.is_empty() => image,
                _ => "none",
            }
        );
        let _ = writeln!(
            out,
            "  password: {}",
            if profile.password.is_some() { "********" } else { "(not known)" }
        );
    }

    if let Some(notice) = &state.notice {
        let prefix = match notice.level {
            NoticeLevel::Info => "-",
            NoticeLevel::Error => "!",
        };
        let _ = writeln!(out, "{} {}", prefix, notice.message);
    }

    out
}
