use std::io::Write;

use super::WordSource;

const CHUNK_BYTES: usize = 4096;

pub fn run(format: &str, n_bytes: usize, pooled: bool) {
    let mut source = WordSource::new(pooled);
    log::debug!("streaming {} output as {format}", source.label());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut total = 0usize;

    loop {
        if n_bytes > 0 && total >= n_bytes {
            break;
        }
        let want = if n_bytes == 0 {
            CHUNK_BYTES
        } else {
            CHUNK_BYTES.min(n_bytes - total)
        };

        let data = source.bytes(want);
        let write_result = match format {
            "hex" => out.write_all(encode_hex(&data).as_bytes()),
            _ => out.write_all(&data),
        };
        if write_result.is_err() {
            break; // Broken pipe
        }
        total += data.len();
    }
    if format == "hex" {
        let _ = out.write_all(b"\n");
    }
    let _ = out.flush();
}

fn encode_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}
