/// Single-pass modulo-10 checksum over a digit string.
///
/// Returns `false` for anything that is not a non-empty run of ASCII digits.
pub fn luhn_valid(number: &str) -> bool {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let sum: u32 = number
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let mut digit = u32::from(b - b'0');
            if i % 2 == 1 {
                digit *= 2;
                if digit > 9 {
                    digit -= 9;
                }
            }
            digit
        })
        .sum();
    sum % 10 == 0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn accepts_valid_checksums() {
        for num in ["79927398713", "4561261212345467", "0", "18", "2377225624"] {
            assert!(luhn_valid(num), "{num} should pass");
        }
    }

    #[test]
    fn rejects_invalid_checksums() {
        for num in ["79927398710", "4561261212345464", "1", "780348941"] {
            assert!(!luhn_valid(num), "{num} should fail");
        }
    }

    #[test]
    fn rejects_non_digit_input() {
        for num in ["", "12a4", " 18", "-18", "1.8"] {
            assert!(!luhn_valid(num), "{num:?} should fail");
        }
    }
}
