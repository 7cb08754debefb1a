//! SHA-512 crypt hashing behind `$6$` salt specs.
//!
//! A spec is the setting prefix of a crypt-style hash: `$6$<salt>$`. The
//! salt ends at the next `$` or at the end of the string, and anything
//! past it is ignored, so a complete stored hash works as a spec too.
//! Password verification relies on exactly that: rehash the candidate
//! with the stored line as the spec and compare the results.

use sha_crypt::{sha512_crypt_b64, Sha512Params, ROUNDS_DEFAULT};

use crate::error::{HashError, HashResult};

/// Scheme prefix for SHA-512 crypt settings
pub const SCHEME_PREFIX: &str = "$6$";

/// Longest salt a setting may carry; excess symbols are dropped
const SALT_MAX_CHARS: usize = 16;

/// Build the salt spec for an encoded salt.
pub fn salt_spec(salt: &str) -> String {
    format!("{SCHEME_PREFIX}{salt}$")
}

/// Hash `secret` according to `spec`, returning the full
/// `$6$<salt>$<hash>` string. Identical secret and spec always produce
/// identical output.
pub fn hash_secret(secret: &[u8], spec: &str) -> HashResult<String> {
    let salt = parse_salt(spec)?;
    let params =
        Sha512Params::new(ROUNDS_DEFAULT).map_err(|e| HashError::Backend(format!("{e:?}")))?;
    let digest = sha512_crypt_b64(secret, salt.as_bytes(), &params)
        .map_err(|e| HashError::Backend(format!("{e:?}")))?;
    Ok(format!("{SCHEME_PREFIX}{salt}${digest}"))
}

/// Extract the salt portion of a setting string.
fn parse_salt(spec: &str) -> HashResult<&str> {
    let rest = spec.strip_prefix(SCHEME_PREFIX).ok_or(HashError::BadFormat)?;
    if rest.starts_with("rounds=") {
        // rounds overrides are neither produced nor accepted here
        return Err(HashError::BadFormat);
    }
    let salt = match rest.find('$') {
        Some(end) => &rest[..end],
        None => rest,
    };
    if !salt.is_ascii() {
        return Err(HashError::BadFormat);
    }
    Ok(&salt[..salt.len().min(SALT_MAX_CHARS)])
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSWORD: &[u8] = b"Hello world!";

    #[test]
    fn test_known_reference_hash() {
        let hashed = hash_secret(PASSWORD, "$6$saltstring$").unwrap();
        assert_eq!(
            hashed,
            "$6$saltstring$svn8UoSVapNtMuq1ukKS4tPQd8iKwSMHWjl/O817G3uBnIFNjnQJuesI68u4OTLiBFdcbYEdFCoEOfaS35inz1"
        );
    }

    #[test]
    fn test_full_hash_reused_as_spec() {
        let first = hash_secret(PASSWORD, "$6$saltstring$").unwrap();
        let second = hash_secret(PASSWORD, &first).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_spec_without_closing_delimiter() {
        assert_eq!(
            hash_secret(PASSWORD, "$6$saltstring").unwrap(),
            hash_secret(PASSWORD, "$6$saltstring$").unwrap()
        );
    }

    #[test]
    fn test_overlong_salt_is_truncated() {
        let long = hash_secret(PASSWORD, "$6$aaaaaaaaaaaaaaaabbbb$").unwrap();
        let short = hash_secret(PASSWORD, "$6$aaaaaaaaaaaaaaaa$").unwrap();
        assert_eq!(long, short);
    }

    #[test]
    fn test_rejects_foreign_schemes() {
        assert!(matches!(hash_secret(PASSWORD, "$5$salt$"), Err(HashError::BadFormat)));
        assert!(matches!(hash_secret(PASSWORD, "plaintext"), Err(HashError::BadFormat)));
        assert!(matches!(
            hash_secret(PASSWORD, "$6$rounds=10000$salt$"),
            Err(HashError::BadFormat)
        ));
    }

    #[test]
    fn test_rejects_non_ascii_salt() {
        assert!(matches!(hash_secret(PASSWORD, "$6$sälté$"), Err(HashError::BadFormat)));
    }

    #[test]
    fn test_salt_spec_format() {
        assert_eq!(salt_spec("abcdABCD0123./ab"), "$6$abcdABCD0123./ab$");
    }
}
