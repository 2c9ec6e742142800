use validator::ValidateEmail;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Validates that the input looks like a valid email address
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    !email.is_empty() && email.validate_email()
}

pub fn is_valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}

/// E.164-ish: optional leading `+`, then 7 to 15 digits.
pub fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

pub fn is_valid_reset_code(code: &str) -> bool {
    code.len() == 6 && code.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("test@example.com"));
        assert!(is_valid_email("user+tag@example.org"));
    }

    #[test]
    fn test_invalid_emails() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("   "));
        assert!(!is_valid_email("notanemail"));
        assert!(!is_valid_email("@nodomain.com"));
    }

    #[test]
    fn test_password_length() {
        assert!(is_valid_password("pass12"));
        assert!(!is_valid_password("12345"));
    }

    #[test]
    fn test_phone_format() {
        assert!(is_valid_phone("+15551234567"));
        assert!(is_valid_phone("+1234567890"));
        assert!(!is_valid_phone("+1-555-123"));
        assert!(!is_valid_phone("12"));
    }

    #[test]
    fn test_reset_code_format() {
        assert!(is_valid_reset_code("012345"));
        assert!(!is_valid_reset_code("12345"));
        assert!(!is_valid_reset_code("12a456"));
    }
}
