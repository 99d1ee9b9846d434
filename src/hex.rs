const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

pub fn bytes_to_hex_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for v in bytes {
        out.push(HEX_DIGITS[(v >> 4) as usize] as char);
        out.push(HEX_DIGITS[(v & 0xF) as usize] as char);
    }
    out
}
