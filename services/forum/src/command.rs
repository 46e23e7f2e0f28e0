//! Line commands for the terminal front-end

use std::path::PathBuf;

use crate::error::{ClientError, ClientResult};
use crate::intent::{Intent, ProfileDraft};
use crate::models::ThreadId;

pub const HELP: &str = "\
Commands:
  login <email> <password>
  register <email> <name> <password> <confirm>
  logout
  more                                  load older threads
  open <thread>
  new [--private] <title> | <content>
  edit <thread> [--private] [--lock] <title> | <content>
  delete <thread>
  like <thread>        watch <thread>
  comment <text>                        on the open thread
  reply <comment> <text>
  edit-comment <comment> <text>
  like-comment <comment>
  profile
  update-profile [email=..] [name=..] [password=..] [image=<file>]
  help
  quit";

/// Parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(Intent),
    Help,
    Quit,
    Nothing,
}

fn usage(text: &str) -> ClientError {
    ClientError::validation(format!("usage: {}", text))
}

fn parse_id(raw: Option<&str>, what: &str) -> ClientResult<u64> {
    let raw = raw.ok_or_else(|| ClientError::validation(format!("missing {} id", what)))?;
    raw.parse()
        .map_err(|_| ClientError::validation(format!("{:?} is not a {} id", raw, what)))
}

fn split_first(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, tail.trim_start()),
        None => (text, ""),
    }
}

/// Strip leading `--flag` words, returning the flags seen and the remainder
fn take_flags(mut rest: &str) -> (Vec<&str>, &str) {
    let mut flags = Vec::new();
    loop {
        let (word, tail) = split_first(rest);
        match word.strip_prefix("--") {
            Some(flag) if !flag.is_empty() => {
                flags.push(flag);
                rest = tail;
            }
            _ => return (flags, rest),
        }
    }
}

fn title_and_content<'a>(rest: &'a str, form: &str) -> ClientResult<(&'a str, &'a str)> {
    rest.split_once('|')
        .map(|(title, content)| (title.trim(), content.trim()))
        .ok_or_else(|| usage(form))
}

fn profile_draft(rest: &str) -> ClientResult<ProfileDraft> {
    let mut draft = ProfileDraft::default();
    for pair in rest.split_whitespace() {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| usage("update-profile [email=..] [name=..] [password=..] [image=<file>]"))?;
        let value = value.to_string();
        match key {
            "email" => draft.email = Some(value),
            "name" => draft.name = Some(value),
            "password" => draft.password = Some(value),
            "image" => draft.image_path = Some(PathBuf::from(value)),
            other => {
                return Err(ClientError::validation(format!(
                    "unknown profile field {:?}",
                    other
                )));
            }
        }
    }
    Ok(draft)
}

/// Parse one line; `focused` is the open thread, needed by comment commands
pub fn parse(line: &str, focused: Option<ThreadId>) -> ClientResult<Command> {
    let (verb, rest) = split_first(line);
    let mut words = rest.split_whitespace();
    let open_thread =
        || focused.ok_or_else(|| ClientError::validation("open a thread first"));

    let intent = match verb {
        "" => return Ok(Command::Nothing),
        "help" | "?" => return Ok(Command::Help),
        "quit" | "exit" => return Ok(Command::Quit),
        "login" => match (words.next(), words.next()) {
            (Some(email), Some(password)) => Intent::login(email, password)?,
            _ => return Err(usage("login <email> <password>")),
        },
        "register" => match (words.next(), words.next(), words.next(), words.next()) {
            (Some(email), Some(name), Some(password), Some(confirm)) => {
                Intent::register(email, name, password, confirm)?
            }
            _ => return Err(usage("register <email> <name> <password> <confirm>")),
        },
        "logout" => Intent::Logout,
        "more" => Intent::LoadMoreThreads,
        "open" => Intent::OpenThread(parse_id(words.next(), "thread")?),
        "new" => {
            let (flags, rest) = take_flags(rest);
            let (title, content) = title_and_content(rest, "new [--private] <title> | <content>")?;
            Intent::create_thread(title, content, !flags.contains(&"private"))?
        }
        "edit" => {
            let (id, rest) = split_first(rest);
            let id = parse_id(Some(id).filter(|s| !s.is_empty()), "thread")?;
            let (flags, rest) = take_flags(rest);
            let (title, content) = title_and_content(
                rest,
                "edit <thread> [--private] [--lock] <title> | <content>",
            )?;
            Intent::edit_thread(
                id,
                title,
                content,
                !flags.contains(&"private"),
                flags.contains(&"lock"),
            )?
        }
        "delete" => Intent::DeleteThread(parse_id(words.next(), "thread")?),
        "like" => Intent::ToggleThreadLike(parse_id(words.next(), "thread")?),
        "watch" => Intent::ToggleThreadWatch(parse_id(words.next(), "thread")?),
        "comment" => Intent::post_comment(open_thread()?, rest)?,
        "reply" => {
            let (parent, text) = split_first(rest);
            let parent = parse_id(Some(parent).filter(|s| !s.is_empty()), "comment")?;
            Intent::reply(open_thread()?, parent, text)?
        }
        "edit-comment" => {
            let (id, text) = split_first(rest);
            let id = parse_id(Some(id).filter(|s| !s.is_empty()), "comment")?;
            Intent::edit_comment(id, text)?
        }
        "like-comment" => Intent::ToggleCommentLike(parse_id(words.next(), "comment")?),
        "profile" => Intent::ShowProfile,
        "update-profile" => Intent::update_profile(profile_draft(rest)?)?,
        other => {
            return Err(ClientError::validation(format!(
                "unknown command {:?}, try `help`",
                other
            )));
        }
    };
    Ok(Command::Run(intent))
}
