use std::fmt;

use bitcoin::bip32::ChildNumber;

use crate::error::BtcError;

/// Five-level BIP32 path: `m/purpose'/coin'/account'/change/index`.
///
/// Holds plain integers only. Anything that needs network parameters takes an
/// [`AccountContext`](crate::context::AccountContext) alongside the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DerivationPath {
    pub purpose: u32,
    pub coin: u32,
    pub account: u32,
    pub change: u32,
    pub index: u32,
}

impl DerivationPath {
    pub fn new(purpose: u32, coin: u32, account: u32, change: u32, index: u32) -> Self {
        Self {
            purpose,
            coin,
            account,
            change,
            index,
        }
    }

    /// Receive addresses sit on the external chain (`change == 0`).
    pub fn is_receive(&self) -> bool {
        self.change == 0
    }

    /// Hardened purpose/coin/account prefix.
    pub(crate) fn account_children(&self) -> Result<[ChildNumber; 3], BtcError> {
        Ok([
            hardened(self.purpose)?,
            hardened(self.coin)?,
            hardened(self.account)?,
        ])
    }

    /// Non-hardened change/index suffix.
    pub(crate) fn address_children(&self) -> Result<[ChildNumber; 2], BtcError> {
        if self.change > 1 {
            return Err(BtcError::DerivationFailure(format!(
                "change must be 0 or 1, got {}",
                self.change
            )));
        }
        Ok([normal(self.change)?, normal(self.index)?])
    }

    pub(crate) fn children(&self) -> Result<[ChildNumber; 5], BtcError> {
        let [p, c, a] = self.account_children()?;
        let [ch, i] = self.address_children()?;
        Ok([p, c, a, ch, i])
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "m/{}'/{}'/{}'/{}/{}",
            self.purpose, self.coin, self.account, self.change, self.index
        )
    }
}

fn hardened(index: u32) -> Result<ChildNumber, BtcError> {
    ChildNumber::from_hardened_idx(index)
        .map_err(|e| BtcError::DerivationFailure(format!("hardened index {index}: {e}")))
}

fn normal(index: u32) -> Result<ChildNumber, BtcError> {
    ChildNumber::from_normal_idx(index)
        .map_err(|e| BtcError::DerivationFailure(format!("normal index {index}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_marks_hardened_levels() {
        let path = DerivationPath::new(84, 0, 0, 1, 5);
        assert_eq!(path.to_string(), "m/84'/0'/0'/1/5");
    }

    #[test]
    fn equality_requires_all_fields() {
        let a = DerivationPath::new(84, 0, 0, 0, 0);
        assert_eq!(a, DerivationPath::new(84, 0, 0, 0, 0));
        assert_ne!(a, DerivationPath::new(84, 0, 0, 0, 1));
        assert_ne!(a, DerivationPath::new(49, 0, 0, 0, 0));
    }

    #[test]
    fn receive_flag_follows_change() {
        assert!(DerivationPath::new(84, 0, 0, 0, 3).is_receive());
        assert!(!DerivationPath::new(84, 0, 0, 1, 3).is_receive());
    }

    #[test]
    fn children_harden_first_three_levels() {
        let children = DerivationPath::new(49, 1, 2, 1, 9).children().unwrap();
        assert_eq!(children[0], ChildNumber::Hardened { index: 49 });
        assert_eq!(children[1], ChildNumber::Hardened { index: 1 });
        assert_eq!(children[2], ChildNumber::Hardened { index: 2 });
        assert_eq!(children[3], ChildNumber::Normal { index: 1 });
        assert_eq!(children[4], ChildNumber::Normal { index: 9 });
    }

    #[test]
    fn change_above_one_is_rejected() {
        let err = DerivationPath::new(84, 0, 0, 2, 0).children().unwrap_err();
        assert!(matches!(err, BtcError::DerivationFailure(_)));
    }

    #[test]
    fn index_outside_normal_range_is_rejected() {
        let err = DerivationPath::new(84, 0, 0, 0, 1 << 31).children().unwrap_err();
        assert!(matches!(err, BtcError::DerivationFailure(_)));
    }
}
