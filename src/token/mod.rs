//! Token Collaborators
//!
//! - `minter` - confidential reward token (yield asset)
//! - `vault` - base asset custody

pub mod minter;
pub mod vault;

pub use minter::{ConfidentialRewardToken, RewardTokenMinter, TokenError, TokenSnapshot};
pub use vault::{BaseAssetVault, NativeVault, VaultError, VaultSnapshot, VaultStats};

#[cfg(test)]
pub use minter::MockRewardTokenMinter;
#[cfg(test)]
pub use vault::MockBaseAssetVault;
