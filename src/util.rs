//! Hex/ASCII renderings of raw card data, for humans staring at dumps.
//! Purely derived; nothing here affects pipeline outcomes.

/// Uppercase hex, no separators: `[0x3F, 0x00]` → `"3F00"`.
pub fn to_hex(data: &[u8]) -> String {
    hex::encode_upper(data)
}

/// Printable ASCII (0x20..=0x7E) as-is, every other byte as `.`.
pub fn to_printable_ascii(data: &[u8]) -> String {
    data.iter()
        .map(|&b| {
            if (0x20..=0x7E).contains(&b) {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

/// Classic 16-bytes-per-line dump: offset, hex bytes, ASCII gutter.
pub fn dump(data: &[u8]) -> String {
    let mut out = String::new();
    for (i, chunk) in data.chunks(16).enumerate() {
        let hex_line = chunk
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(&format!(
            "{:04X}: {:48}  {}\n",
            i * 16,
            hex_line,
            to_printable_ascii(chunk),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_ascii_covers_every_byte() {
        for b in 0u8..=0xFF {
            let s = to_printable_ascii(&[b]);
            if (0x20..=0x7E).contains(&b) {
                assert_eq!(s, (b as char).to_string());
            } else {
                assert_eq!(s, ".");
            }
        }
    }

    #[test]
    fn hex_round_trips() {
        let buf = b"MININT 01/01/2030";
        assert_eq!(hex::decode(to_hex(buf)).unwrap(), buf);
    }

    #[test]
    fn dump_lines_up() {
        let data: Vec<u8> = (0u8..20).chain(b"ROSSI".iter().copied()).collect();
        let out = dump(&data);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0000: 00 01 02 03"));
        assert!(lines[1].starts_with("0010: "));
        assert!(lines[1].ends_with("....ROSSI"));
    }
}
