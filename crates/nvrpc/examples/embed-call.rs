//! Spawn an editor child process and issue one call against it.
//!
//! Run with:
//!   cargo run --example embed-call -- nvim --embed -u NONE
//!
//! Issues `nvim_strwidth("hello")` and prints the result.

use std::sync::Arc;
use std::thread;

use nvrpc::session::{Session, Value};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    if argv.is_empty() {
        eprintln!("usage: embed-call <editor argv...>");
        std::process::exit(64);
    }

    let session = Arc::new(Session::child(&argv)?);
    let runner = {
        let session = Arc::clone(&session);
        thread::spawn(move || session.run(|_, _| {}))
    };

    let width = session.request("nvim_strwidth", vec![Value::from("hello")])?;
    println!("strwidth(\"hello\") = {width}");

    session.shutdown();
    let _ = runner.join();
    Ok(())
}
