//! Handles the engine's input and output with the client.
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::io::{stdin, stdout, BufRead, Write};
use std::sync::Mutex;
use std::sync::mpsc::*;
use std::thread;
use log::{error, info};

/// Serializes output lines, so records emitted by the search thread and the command loop
/// never interleave.
static OUTPUT: Mutex<()> = Mutex::new(());

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Provides a pollable interface with the client using stdin and stdout. All input and
/// output is logged using the log crate (assuming a logger is set up).
#[derive(Debug)]
pub struct Client(Receiver<String>);

impl Client {
    /// Creates and returns a new interface.
    pub fn connect() -> Self {
        let (sender, receiver) = channel();
        thread::spawn(move || {
            Self::thread(sender);
        });

        Self(receiver)
    }

    /// Retrieves a line from the client. Blocks until one is received; errors when the
    /// input stream has closed.
    pub fn recv(&self) -> Result<String, RecvError> {
        self.0.recv()
    }

    /// Sends one line to the client.
    pub fn send(s: &str) {
        let _guard = OUTPUT.lock().expect("INFALLIBLE");
        let mut out = stdout();
        if writeln!(out, "{}", s).and_then(|_| out.flush()).is_err() {
            error!("cannot write to client");
        }
        info!("<engine>: {}", s);
    }

    /// A function run in a separate thread to get input from stdin.
    fn thread(sender: Sender<String>) {
        for line in stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    error!("cannot read from client: {}", err);
                    break;
                },
            };
            info!("<client>: {}", line);
            if sender.send(line).is_err() {
                break;
            }
        }
    }
}
