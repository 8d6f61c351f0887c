//! Interactive shell.
//!
//! One long-lived store serves every line, so a guest cart survives between
//! commands and catalog filters carry over from one `products` call to the
//! next.

use std::io::Write;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use ymgs_storefront::api::HttpShopApi;
use ymgs_storefront::session::TokenStore;
use ymgs_storefront::state::ShopState;

use super::output;
use crate::{CliError, ShellLine};

const PROMPT: &str = "ymgs> ";

pub async fn run<S: TokenStore>(shop: &ShopState<HttpShopApi, S>) -> Result<(), CliError> {
    shop.init().await;
    {
        let mut out = std::io::stdout().lock();
        output::line(&mut out, "Type `help` for commands, `exit` to quit.")?;
        output::notices(&mut out, &shop.take_notices())?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let words = split_words(&line);
        match words.first().map(String::as_str) {
            None => {}
            Some("exit" | "quit") => break,
            Some(_) => match ShellLine::try_parse_from(&words) {
                Ok(parsed) => crate::execute(shop, parsed.command).await?,
                Err(e) => {
                    let mut out = std::io::stdout().lock();
                    write!(out, "{}", e.render())?;
                }
            },
        }
    }
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    let mut out = std::io::stdout().lock();
    write!(out, "{PROMPT}")?;
    out.flush()
}

/// Split a shell line on whitespace, keeping double-quoted runs together.
fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_word = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}
