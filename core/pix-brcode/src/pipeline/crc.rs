//! CRC-16/CCITT-FALSE, as mandated for BR Code payloads.
//!
//! The check value covers every byte of the payload up to and including
//! the CRC record's own tag-length header (`"6304"`), and is rendered as
//! four zero-padded upper-case hex digits.

/// Calculate the CRC-16/CCITT-FALSE checksum of `data`.
///
/// Polynomial `0x1021`, initial value `0xFFFF`, no reflection, no
/// final xor.
pub fn checksum(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Render the checksum of `data` as the 4-character upper-case hex string
/// carried in the BR Code's trailing CRC field.
pub fn render(data: &str) -> String {
    format!("{:04X}", checksum(data.as_bytes()))
}

/// Verify a complete BR Code payload against its trailing 4-character CRC.
///
/// The expected value is the last four characters; the computed value
/// covers everything before them (including the `6304` header). The
/// comparison is exact: a lower-case CRC is rejected.
pub fn verify(payload: &str) -> bool {
    // The CRC is the last four characters; everything before it (which
    // may carry multi-byte text in merchant fields) is covered.
    let Some((split, _)) = payload.char_indices().rev().nth(3) else {
        return false;
    };
    if split == 0 {
        return false;
    }
    let (covered, expected) = payload.split_at(split);
    render(covered) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_the_ccitt_false_check_value() {
        // Canonical check input for CRC-16/CCITT-FALSE.
        assert_eq!(checksum(b"123456789"), 0x29B1);
    }

    #[test]
    fn renders_zero_padded_uppercase() {
        assert_eq!(render("123456789"), "29B1");
    }

    #[test]
    fn verifies_a_known_static_br_code() {
        let payload = "00020126580014br.gov.bcb.pix0136123e4567-e12b-12d1-a456-4266554400005204000053039865802BR5913Fulano de Tal6008BRASILIA62070503***63041D3D";
        assert!(verify(payload));
    }

    #[test]
    fn rejects_a_flipped_crc_digit() {
        let payload = "00020126580014br.gov.bcb.pix0136123e4567-e12b-12d1-a456-4266554400005204000053039865802BR5913Fulano de Tal6008BRASILIA62070503***63041D3C";
        assert!(!verify(payload));
    }

    #[test]
    fn rejects_lowercase_crc() {
        let payload = "00020126580014br.gov.bcb.pix0136123e4567-e12b-12d1-a456-4266554400005204000053039865802BR5913Fulano de Tal6008BRASILIA62070503***63041d3d";
        assert!(!verify(payload));
    }

    #[test]
    fn rejects_short_input() {
        assert!(!verify(""));
        assert!(!verify("6304FFF"));
        assert!(!verify("FFFF"));
    }

    #[test]
    fn covers_multibyte_merchant_text() {
        let covered = "0002015910São Paulo!6304";
        let payload = format!("{covered}{}", render(covered));
        assert!(verify(&payload));
    }
}
