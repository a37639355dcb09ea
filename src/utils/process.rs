use std::{
    io::{BufRead, BufReader},
    process::{Command, ExitStatus, Stdio},
};

use tracing::{debug, trace};

use crate::errors::TryciError;

/// Receives the output of a child process line by line, ANSI escapes
/// already stripped.
pub trait OutputFormatter {
    fn line(&mut self, line: &str) -> Result<(), TryciError>;
    fn err_line(&mut self, line: &str) -> Result<(), TryciError>;
}

#[derive(Debug, Clone, Default)]
pub struct DefaultFormatter;

impl OutputFormatter for DefaultFormatter {
    fn line(&mut self, line: &str) -> Result<(), TryciError> {
        trace!(target: "tryci::stdout", "{}", line);
        Ok(())
    }

    fn err_line(&mut self, line: &str) -> Result<(), TryciError> {
        trace!(target: "tryci::stderr", "{}", line);
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct CaptureOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: ExitStatus,
}

/// Bytes of one output line, ANSI escapes removed and invalid UTF-8
/// replaced.
fn clean_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(&strip_ansi_escapes::strip(raw)).to_string()
}

fn read_lines<R: BufRead>(mut reader: R) -> std::io::Result<Vec<String>> {
    let mut lines = vec![];
    let mut buffer = vec![];
    while reader.read_until(b'\n', &mut buffer)? > 0 {
        lines.push(clean_line(&buffer));
        buffer.clear();
    }
    Ok(lines)
}

pub fn describe(command: &Command) -> String {
    let program = command.get_program().to_string_lossy().to_string();
    let args: Vec<String> = command
        .get_args()
        .map(|arg| arg.to_string_lossy().to_string())
        .collect();
    if args.is_empty() {
        program
    } else {
        format!("{} {}", program, args.as_slice().join(" "))
    }
}

/// Runs `cmd` to completion, feeding every stdout and stderr line to
/// `formatter` and returning both streams.
pub fn run_and_capture<F: OutputFormatter>(
    mut cmd: Command,
    formatter: &mut F,
) -> Result<CaptureOutput, TryciError> {
    debug!("running {}", describe(&cmd));
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = cmd.spawn().map_err(|e| {
        TryciError::RuntimeError(format!("Failed to start '{}': {}", describe(&cmd), e))
    })?;

    // stderr is drained on its own thread so a chatty child cannot block on a
    // full pipe while stdout is being read
    let stderr_reader = child
        .stderr
        .take()
        .map(|stderr| std::thread::spawn(move || read_lines(BufReader::new(stderr))));

    let mut stdout_output = String::new();
    let mut stdout_result: Result<(), TryciError> = Ok(());
    if let Some(stdout) = child.stdout.take() {
        let mut reader = BufReader::new(stdout);
        let mut buffer = vec![];
        loop {
            match reader.read_until(b'\n', &mut buffer) {
                Ok(0) => break,
                Ok(_) => {
                    let line = clean_line(&buffer);
                    buffer.clear();
                    if let Err(e) = formatter.line(&line) {
                        stdout_result = Err(e);
                        break;
                    }
                    stdout_output.push_str(&line);
                    stdout_output.push('\n');
                }
                Err(e) => {
                    stdout_result = Err(e.into());
                    break;
                }
            }
        }
    }

    // reap the child before reporting any read error
    let stderr_lines = stderr_reader.map(|handle| handle.join());
    let status = child.wait()?;
    debug!("{} exited with {}", describe(&cmd), status);
    stdout_result?;

    let mut stderr_output = String::new();
    if let Some(lines) = stderr_lines {
        let lines = lines
            .map_err(|_| TryciError::RuntimeError("stderr reader panicked".to_string()))??;
        for line in lines {
            formatter.err_line(&line)?;
            stderr_output.push_str(&line);
            stderr_output.push('\n');
        }
    }

    Ok(CaptureOutput {
        stdout: stdout_output,
        stderr: stderr_output,
        status,
    })
}

/// Runs `cmd` with the terminal attached.
pub fn run_inherit(mut cmd: Command) -> Result<ExitStatus, TryciError> {
    debug!("running {}", describe(&cmd));
    let status = cmd.status().map_err(|e| {
        TryciError::RuntimeError(format!("Failed to start '{}': {}", describe(&cmd), e))
    })?;
    debug!("{} exited with {}", describe(&cmd), status);
    Ok(status)
}

/// Splits a configured command line such as `python test.py` into a
/// `Command`.
pub fn command_from_line(line: &str) -> Result<Command, TryciError> {
    let mut parts = line.split_whitespace();
    let program = parts.next().ok_or(TryciError::ConfigError(format!(
        "empty command line '{}'",
        line
    )))?;
    let mut command = Command::new(program);
    command.args(parts);
    Ok(command)
}
