pub mod account;
pub mod bip44;
pub mod config;
pub mod detect;
pub mod errors;
pub mod validation;
pub mod wallet;
pub mod wallet_manager;

pub use account::{Account, MnemonicInfo};
pub use detect::{classify, KeyFormat};
pub use wallet::MultiAccountWallet;
pub use wallet_manager::WalletManager;
