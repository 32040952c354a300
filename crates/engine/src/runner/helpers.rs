use std::fmt;
use std::io::{self, Read};
use std::process::Child;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

/// Size of each partial read taken from a child stream.
pub(crate) const READ_CHUNK: usize = 64 * 1024;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

#[derive(Debug)]
pub(crate) enum StreamMessage {
    Data(StreamKind, Vec<u8>),
    Error(StreamKind, io::Error),
    Finished(StreamKind),
}

/// Reads `reader` in partial chunks, handing each chunk to `sender` as soon
/// as it arrives, and reports end-of-stream with [`StreamMessage::Finished`].
pub(crate) fn spawn_reader<R>(
    mut reader: R,
    kind: StreamKind,
    sender: Sender<StreamMessage>,
) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buffer = vec![0_u8; READ_CHUNK];
        loop {
            match reader.read(&mut buffer) {
                Ok(0) => {
                    let _ = sender.send(StreamMessage::Finished(kind));
                    return;
                }
                Ok(read) => {
                    if sender
                        .send(StreamMessage::Data(kind, buffer[..read].to_vec()))
                        .is_err()
                    {
                        return;
                    }
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => {
                    let _ = sender.send(StreamMessage::Error(kind, error));
                    return;
                }
            }
        }
    })
}

pub(crate) fn join_reader(handle: &mut Option<JoinHandle<()>>) {
    if let Some(handle) = handle.take() {
        let _ = handle.join();
    }
}

/// Kills the child and reaps it together with both reader threads.
pub(crate) fn terminate_process(
    child: &mut Child,
    stdout_thread: &mut Option<JoinHandle<()>>,
    stderr_thread: &mut Option<JoinHandle<()>>,
) {
    let _ = child.kill();
    let _ = child.wait();
    join_reader(stdout_thread);
    join_reader(stderr_thread);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::mpsc;

    #[test]
    fn reader_forwards_chunks_then_finishes() {
        let (sender, receiver) = mpsc::channel();
        let payload = vec![7_u8; READ_CHUNK + 10];
        let mut handle = Some(spawn_reader(
            Cursor::new(payload.clone()),
            StreamKind::Stdout,
            sender,
        ));

        let mut collected = Vec::new();
        let mut finished = false;
        for message in receiver {
            match message {
                StreamMessage::Data(StreamKind::Stdout, data) => collected.extend(data),
                StreamMessage::Finished(StreamKind::Stdout) => finished = true,
                other => panic!("unexpected message {other:?}"),
            }
        }
        join_reader(&mut handle);

        assert!(finished);
        assert_eq!(collected, payload);
    }

    #[test]
    fn reader_reports_errors() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("boom"))
            }
        }

        let (sender, receiver) = mpsc::channel();
        let mut handle = Some(spawn_reader(Broken, StreamKind::Stderr, sender));
        let message = receiver.recv().expect("message");
        join_reader(&mut handle);

        assert!(matches!(message, StreamMessage::Error(StreamKind::Stderr, _)));
    }

    #[test]
    fn stream_kinds_render() {
        assert_eq!(StreamKind::Stdout.to_string(), "stdout");
        assert_eq!(StreamKind::Stderr.to_string(), "stderr");
    }
}
