//! # Password Generation
//!
//! Generates Aqua user passwords that satisfy the configured character-class policy.

use rand::seq::SliceRandom;
use thiserror::Error;

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const NUMBERS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$";

/// Password policy error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PasswordPolicyError {
    /// The length cannot hold one character of every required class
    #[error("password length {length} is shorter than the {required} required character classes")]
    TooShort { length: usize, required: usize },
}

/// Character-class policy for generated passwords
///
/// Lowercase letters are always required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub length: usize,
    pub include_uppercase: bool,
    pub include_numbers: bool,
    pub include_symbols: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            length: crate::constants::DEFAULT_PASSWORD_LENGTH,
            include_uppercase: true,
            include_numbers: true,
            include_symbols: true,
        }
    }
}

impl PasswordPolicy {
    fn required_classes(&self) -> Vec<&'static [u8]> {
        let mut classes = vec![LOWERCASE];
        if self.include_uppercase {
            classes.push(UPPERCASE);
        }
        if self.include_numbers {
            classes.push(NUMBERS);
        }
        if self.include_symbols {
            classes.push(SYMBOLS);
        }
        classes
    }

    /// Check the policy can be satisfied
    ///
    /// # Errors
    ///
    /// Returns [`PasswordPolicyError::TooShort`] when `length` is smaller than the number
    /// of required classes.
    pub fn validate(&self) -> Result<(), PasswordPolicyError> {
        let required = self.required_classes().len();
        if self.length < required {
            return Err(PasswordPolicyError::TooShort {
                length: self.length,
                required,
            });
        }
        Ok(())
    }

    /// Generate a password satisfying every required class
    ///
    /// Candidates are drawn uniformly from the union of the enabled classes and
    /// redrawn until each required class appears at least once.
    ///
    /// # Errors
    ///
    /// See [`PasswordPolicy::validate`].
    pub fn generate(&self) -> Result<String, PasswordPolicyError> {
        self.validate()?;

        let classes = self.required_classes();
        let alphabet: Vec<u8> = classes.iter().flat_map(|class| class.iter().copied()).collect();
        let mut rng = rand::thread_rng();

        loop {
            let candidate: Vec<u8> = (0..self.length)
                .filter_map(|_| alphabet.choose(&mut rng).copied())
                .collect();

            let satisfied = classes
                .iter()
                .all(|class| candidate.iter().any(|c| class.contains(c)));
            if satisfied {
                return Ok(candidate.into_iter().map(char::from).collect());
            }
        }
    }
}

/// Generate a password with lowercase letters plus the selected classes
///
/// # Errors
///
/// Returns an error if `length` cannot hold every required class.
pub fn generate_password(
    length: usize,
    include_symbols: bool,
    include_numbers: bool,
    include_uppercase: bool,
) -> Result<String, PasswordPolicyError> {
    PasswordPolicy {
        length,
        include_uppercase,
        include_numbers,
        include_symbols,
    }
    .generate()
}
