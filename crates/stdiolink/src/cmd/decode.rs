use std::fs;
use std::io::{self, Read};

use stdiolink_frame::{FrameConfig, FrameError, LineFramer};
use stdiolink_session::decode;

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_decoded, DecodedFrame, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = match &args.file {
        Some(path) => fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?,
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .map_err(|err| io_error("failed reading stdin", err))?;
            buf
        }
    };

    let rows = classify(&bytes, args.max_frame_size)?;
    print_decoded(&rows, format);

    if args.strict && rows.iter().any(DecodedFrame::is_problem) {
        return Ok(DATA_INVALID);
    }
    Ok(SUCCESS)
}

/// Frame and decode a whole transcript. An unterminated last line is
/// decoded too.
pub fn classify(bytes: &[u8], max_frame_size: Option<usize>) -> CliResult<Vec<DecodedFrame>> {
    let mut framer = LineFramer::with_config(FrameConfig {
        max_frame_size,
        ..FrameConfig::default()
    });

    let mut rows = Vec::new();
    for (index, frame) in framer.feed(bytes).enumerate() {
        let line = index + 1;
        match frame {
            Ok(frame) => rows.push(DecodedFrame::new(line, &decode(&frame.payload))),
            Err(FrameError::FrameTooLarge { size, max }) => rows.push(DecodedFrame {
                line,
                variant: "oversized",
                detail: format!("{size} bytes, max {max}"),
                raw: String::new(),
            }),
            Err(err) => return Err(frame_error("framing failed", err)),
        }
    }
    if let Some(tail) = framer.take_remainder() {
        rows.push(DecodedFrame::new(rows.len() + 1, &decode(&tail)));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_a_transcript() {
        let transcript = b"{\"REPORT\":\"PROGRESS\",\"TEXT\":\"1/2\"}\n\nnot json\n{\"DONE\":true}";
        let rows = classify(transcript, None).unwrap();

        let variants: Vec<_> = rows.iter().map(|row| row.variant).collect();
        assert_eq!(variants, vec!["report", "keepalive", "malformed", "completion"]);
        assert_eq!(rows[3].line, 4);
        assert!(rows.iter().any(DecodedFrame::is_problem));
    }

    #[test]
    fn oversized_lines_are_flagged() {
        let rows = classify(b"0123456789\n{}\n", Some(4)).unwrap();
        assert_eq!(rows[0].variant, "oversized");
        assert_eq!(rows[1].variant, "unrecognized");
    }
}
