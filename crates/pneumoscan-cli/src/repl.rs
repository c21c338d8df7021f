//! Interactive session: one event loop over stdin commands, the model load,
//! and in-flight identify requests.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::LocalBoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use pneumoscan_ai::ModelLoader;
use pneumoscan_core::{ImageInput, ModelStatus, SessionConfig};
use pneumoscan_session::{Completion, IdentifyOutcome, SessionController};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::display;

const HELP: &str = "\
Commands:
  upload <path>   select an image file
  url <url>       select an image by URL
  identify        classify the current image
  pick <n>        reselect history entry n (0 = most recent)
  clear           deselect the current image
  reset           clear the image and the history
  reload          load the model again
  state           show the session
  help            show this help
  quit            exit";

#[derive(Debug, PartialEq)]
enum Command {
    Upload(PathBuf),
    Url(String),
    Identify,
    Pick(usize),
    Clear,
    Reset,
    Reload,
    State,
    Help,
    Quit,
}

fn parse(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, arg) = match line.split_once(char::is_whitespace) {
        Some((verb, arg)) => (verb, arg.trim()),
        None => (line, ""),
    };
    let needs_arg = |what: &str| -> Result<(), String> {
        if arg.is_empty() {
            Err(format!("usage: {verb} <{what}>"))
        } else {
            Ok(())
        }
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "upload" => {
            needs_arg("path")?;
            Command::Upload(PathBuf::from(arg))
        }
        "url" => {
            needs_arg("url")?;
            Command::Url(arg.to_string())
        }
        "pick" => {
            needs_arg("n")?;
            let n = arg
                .parse()
                .map_err(|_| format!("not a history index: {arg}"))?;
            Command::Pick(n)
        }
        "identify" | "id" => Command::Identify,
        "clear" => Command::Clear,
        "reset" => Command::Reset,
        "reload" => Command::Reload,
        "state" | "show" => Command::State,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command '{other}' (try 'help')")),
    };
    Ok(Some(command))
}

fn load_model(loader: &Arc<ModelLoader>, uri: &str) -> LocalBoxFuture<'static, ModelStatus> {
    let loader = Arc::clone(loader);
    let uri = uri.to_string();
    async move { loader.load(&uri).await }.boxed_local()
}

fn prompt() -> std::io::Result<()> {
    print!("> ");
    std::io::stdout().flush()
}

pub async fn run(
    config: &SessionConfig,
    loader: Arc<ModelLoader>,
    mut session: SessionController,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut model_rx = loader.subscribe();
    let mut loads: FuturesUnordered<LocalBoxFuture<'static, ModelStatus>> = FuturesUnordered::new();
    let mut jobs: FuturesUnordered<LocalBoxFuture<'static, IdentifyOutcome>> =
        FuturesUnordered::new();

    println!("{HELP}\n");
    loads.push(load_model(&loader, &config.model_uri));
    display::print_snapshot(&session.snapshot());
    prompt()?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let command = match parse(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => {
                        prompt()?;
                        continue;
                    }
                    Err(msg) => {
                        eprintln!("{msg}");
                        prompt()?;
                        continue;
                    }
                };

                match command {
                    Command::Quit => break,
                    Command::Help => println!("{HELP}"),
                    Command::State => display::print_snapshot(&session.snapshot()),
                    Command::Upload(path) => {
                        match pneumoscan_core::UploadedFile::from_path(&path).await {
                            Ok(file) => apply(&mut session, ImageInput::Upload(vec![file])),
                            Err(e) => eprintln!("{e}"),
                        }
                    }
                    Command::Url(url) => apply(&mut session, ImageInput::Url(url)),
                    Command::Pick(n) => match session.select_history_entry(n) {
                        Ok(()) => display::print_snapshot(&session.snapshot()),
                        Err(e) => eprintln!("{e}"),
                    },
                    Command::Identify => match session.begin_identify() {
                        Ok(Some(job)) => {
                            jobs.push(job.run().boxed_local());
                            display::print_snapshot(&session.snapshot());
                        }
                        Ok(None) => eprintln!("no image selected"),
                        Err(e) => eprintln!("{e}"),
                    },
                    Command::Clear => {
                        session.clear_image();
                        display::print_snapshot(&session.snapshot());
                    }
                    Command::Reset => {
                        session.reset();
                        display::print_snapshot(&session.snapshot());
                    }
                    Command::Reload => loads.push(load_model(&loader, &config.model_uri)),
                }
                prompt()?;
            }

            Some(status) = loads.next(), if !loads.is_empty() => {
                debug!(%status, "model load finished");
            }

            Ok(()) = model_rx.changed() => {
                session.refresh();
                let snapshot = session.snapshot();
                println!();
                display::print_snapshot(&snapshot);
                prompt()?;
            }

            Some(outcome) = jobs.next(), if !jobs.is_empty() => {
                match session.complete_identify(outcome) {
                    Completion::Stale => continue,
                    Completion::Applied(_) | Completion::Failed(_) => {
                        println!();
                        display::print_snapshot(&session.snapshot());
                        prompt()?;
                    }
                }
            }
        }
    }
    Ok(())
}

fn apply(session: &mut SessionController, input: ImageInput) {
    match session.apply_input(input) {
        Ok(()) => display::print_snapshot(&session.snapshot()),
        Err(e) => eprintln!("{e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_arguments() {
        assert_eq!(
            parse("upload  scans/a.png ").unwrap(),
            Some(Command::Upload(PathBuf::from("scans/a.png")))
        );
        assert_eq!(
            parse("url https://example.org/x.png").unwrap(),
            Some(Command::Url("https://example.org/x.png".into()))
        );
        assert_eq!(parse("pick 2").unwrap(), Some(Command::Pick(2)));
        assert_eq!(parse("IDENTIFY").unwrap(), Some(Command::Identify));
    }

    #[test]
    fn blank_line_is_ignored() {
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn missing_argument_is_reported() {
        assert!(parse("upload").unwrap_err().contains("usage"));
        assert!(parse("pick two").unwrap_err().contains("two"));
    }

    #[test]
    fn unknown_command_is_reported() {
        assert!(parse("frobnicate").unwrap_err().contains("unknown"));
    }
}
