// Include shared test helpers in this integration test crate.
mod util;

use multi_account_wallet::crypto::keystore::{encrypt_keystore, ScryptParams};
use multi_account_wallet::{
    Account, MultiAccountWallet, Vault, VaultError, WalletAction, WalletError, WalletEvent,
};
use pretty_assertions::assert_eq;
use secrecy::ExposeSecret;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use util::*;

#[tokio::test]
async fn test_add_without_material_creates_random_account() {
    let manager = ScriptedManager::with_password(PASSWORD);
    let (wallet, vault) = new_wallet(manager.clone());

    let address = wallet.add(None).await.unwrap();

    assert_eq!(wallet.accounts(), vec![address.clone()]);
    assert_eq!(vault.accounts().await.unwrap(), vec![address.clone()]);
    assert!(vault.keystore(&address).await.unwrap().is_some());
    assert!(!wallet.has_signing_key());
    assert_eq!(manager.last_action(), Some(WalletAction::Add));

    let second = wallet.add(None).await.unwrap();
    assert_ne!(address, second);
    assert_eq!(wallet.accounts().len(), 2);
}

#[tokio::test]
async fn test_add_private_key_and_mnemonic() {
    let manager = ScriptedManager::with_password(PASSWORD);
    let (wallet, _vault) = new_wallet(manager);

    assert_eq!(wallet.add(Some(KEY_1)).await.unwrap(), ADDRESS_1);
    assert_eq!(wallet.add(Some(TEST_MNEMONIC)).await.unwrap(), ADDRESS_0);
    assert_eq!(wallet.accounts(), vec![ADDRESS_1.to_string(), ADDRESS_0.to_string()]);
}

#[tokio::test]
async fn test_add_keystore_stores_ciphertext_without_prompt() {
    let manager = ScriptedManager::with_password(PASSWORD);
    let (wallet, vault) = new_wallet(manager.clone());
    let account = Account::from_private_key_hex(KEY_0).unwrap();
    let json = encrypt_keystore(&account, b"other password", &ScryptParams { log_n: 4, r: 8, p: 1 })
        .unwrap();

    let address = wallet.add(Some(&json)).await.unwrap();

    assert_eq!(address, ADDRESS_0);
    assert_eq!(manager.prompt_count(), 0);
    assert_eq!(vault.keystore(ADDRESS_0).await.unwrap().as_deref(), Some(json.as_str()));

    // password is only checked on activation
    let err = wallet.activate(ADDRESS_0).await.unwrap_err();
    assert!(matches!(err, WalletError::DecryptionFailed));

    manager.push(Reply::Password("other password".into()));
    wallet.activate(ADDRESS_0).await.unwrap();
    assert!(wallet.has_signing_key());
}

#[tokio::test]
async fn test_add_unrecognized_material() {
    let manager = ScriptedManager::with_password(PASSWORD);
    let (wallet, vault) = new_wallet(manager.clone());

    let err = wallet.add(Some("definitely not a key")).await.unwrap_err();
    assert!(matches!(err, WalletError::UnrecognizedKeyMaterial));
    assert!(vault.is_empty().await);
    assert_eq!(manager.prompt_count(), 0);
}

#[tokio::test]
async fn test_add_rejects_truncated_keystore() {
    let manager = ScriptedManager::with_password(PASSWORD);
    let (wallet, vault) = new_wallet(manager);
    let json = encrypt_keystore(
        &Account::from_private_key_hex(KEY_0).unwrap(),
        PASSWORD.as_bytes(),
        &ScryptParams { log_n: 4, r: 8, p: 1 },
    )
    .unwrap();
    let mut doc: serde_json::Value = serde_json::from_str(&json).unwrap();
    doc["crypto"]["ciphertext"] = "aabb".into();

    let err = wallet.add(Some(&doc.to_string())).await.unwrap_err();
    assert!(matches!(err, WalletError::UnrecognizedKeyMaterial));
    assert!(wallet.accounts().is_empty());
    assert!(vault.accounts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_add_cancelled_writes_nothing() {
    let manager = ScriptedManager::with_password(PASSWORD);
    manager.push(Reply::Cancel);
    let (wallet, vault) = new_wallet(manager);

    let err = wallet.add(Some(KEY_0)).await.unwrap_err();
    assert!(matches!(err, WalletError::UserCancelled));
    assert!(vault.is_empty().await);
    assert!(wallet.accounts().is_empty());
}

#[tokio::test]
async fn test_re_adding_does_not_duplicate() {
    let manager = ScriptedManager::with_password(PASSWORD);
    let (wallet, vault) = new_wallet(manager);

    wallet.add(Some(KEY_0)).await.unwrap();
    wallet.add(Some(&KEY_0.to_uppercase().replace("0X", "0x"))).await.unwrap();
    assert_eq!(vault.accounts().await.unwrap(), vec![ADDRESS_0.to_string()]);
}

#[tokio::test]
async fn test_failed_index_write_rolls_back_blob() {
    let manager = ScriptedManager::with_password(PASSWORD);
    let vault = Arc::new(FlakyVault::default());
    vault.fail_index_writes.store(true, Ordering::SeqCst);
    let wallet = MultiAccountWallet::new(vault.clone(), manager, test_config());

    let err = wallet.add(Some(KEY_0)).await.unwrap_err();
    assert!(matches!(err, WalletError::Vault(VaultError::WriteFailed { .. })));
    assert!(vault.keystore(ADDRESS_0).await.unwrap().is_none());
    assert!(wallet.accounts().is_empty());
}

#[tokio::test]
async fn test_vault_errors_pass_through() {
    let manager = ScriptedManager::with_password(PASSWORD);
    let vault = Arc::new(FlakyVault::default());
    let wallet = MultiAccountWallet::new(vault.clone(), manager, test_config());
    wallet.add(Some(KEY_0)).await.unwrap();

    vault.unavailable.store(true, Ordering::SeqCst);
    let err = wallet.activate(ADDRESS_0).await.unwrap_err();
    assert!(matches!(err, WalletError::Vault(VaultError::Unavailable(_))));
    assert!(!wallet.has_signing_key());
}

#[tokio::test]
async fn test_activate_caches_key_and_sets_default() {
    let manager = ScriptedManager::with_password(PASSWORD);
    let (wallet, vault) = new_wallet(manager.clone());
    wallet.add(Some(KEY_0)).await.unwrap();

    wallet.activate(ADDRESS_0).await.unwrap();
    assert!(wallet.has_signing_key());
    assert_eq!(wallet.address().as_deref(), Some(ADDRESS_0));
    assert_eq!(vault.default_address().await.unwrap().as_deref(), Some(ADDRESS_0));
    assert_eq!(manager.last_action(), Some(WalletAction::Activate));

    let prompts = manager.prompt_count();
    let key = wallet.get_private_key(Some(ADDRESS_0)).await.unwrap();
    assert_eq!(key.expose_secret(), KEY_0);
    assert_eq!(manager.prompt_count(), prompts);
}

#[tokio::test]
async fn test_activate_accepts_lowercase_address() {
    let manager = ScriptedManager::with_password(PASSWORD);
    let (wallet, _vault) = new_wallet(manager);
    wallet.add(Some(KEY_0)).await.unwrap();

    wallet.activate(&ADDRESS_0.to_lowercase()).await.unwrap();
    assert_eq!(wallet.address().as_deref(), Some(ADDRESS_0));
}

#[tokio::test]
async fn test_activate_unknown_address() {
    let manager = ScriptedManager::with_password(PASSWORD);
    let (wallet, _vault) = new_wallet(manager.clone());

    let err = wallet.activate(ADDRESS_1).await.unwrap_err();
    assert!(matches!(err, WalletError::AddressNotInWallet(_)));
    assert_eq!(manager.prompt_count(), 0);
}

#[tokio::test]
async fn test_activate_wrong_password_leaves_state_untouched() {
    let manager = ScriptedManager::with_password(PASSWORD);
    let (wallet, vault) = new_wallet(manager.clone());
    wallet.add(Some(KEY_0)).await.unwrap();

    manager.push(Reply::Password("wrong".into()));
    let err = wallet.activate(ADDRESS_0).await.unwrap_err();
    assert!(matches!(err, WalletError::DecryptionFailed));
    assert!(!wallet.has_signing_key());
    assert!(wallet.address().is_none());
    assert!(vault.default_address().await.unwrap().is_none());
}

#[tokio::test]
async fn test_activate_cancelled_stays_locked() {
    let manager = ScriptedManager::with_password(PASSWORD);
    let (wallet, _vault) = new_wallet(manager.clone());
    wallet.add(Some(KEY_0)).await.unwrap();

    manager.push(Reply::Cancel);
    let err = wallet.activate(ADDRESS_0).await.unwrap_err();
    assert!(matches!(err, WalletError::UserCancelled));
    assert!(!wallet.has_signing_key());
    assert_eq!(wallet.accounts(), vec![ADDRESS_0.to_string()]);
}

#[tokio::test]
async fn test_signing_key_expires_after_ttl() {
    let manager = ScriptedManager::with_password(PASSWORD);
    let (wallet, _vault) = new_wallet(manager);
    wallet.add(Some(KEY_0)).await.unwrap();

    wallet.activate_with_ttl(ADDRESS_0, Duration::from_millis(50)).await.unwrap();
    assert!(wallet.has_signing_key());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!wallet.has_signing_key());
    // still the active, now locked, account
    assert_eq!(wallet.address().as_deref(), Some(ADDRESS_0));
}

#[tokio::test]
async fn test_reactivation_cancels_previous_timer() {
    let manager = ScriptedManager::with_password(PASSWORD);
    let (wallet, _vault) = new_wallet(manager);
    wallet.add(Some(KEY_0)).await.unwrap();

    wallet.activate_with_ttl(ADDRESS_0, Duration::from_millis(50)).await.unwrap();
    wallet.activate_with_ttl(ADDRESS_0, Duration::from_secs(30)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(wallet.has_signing_key());
}

#[tokio::test]
async fn test_delete_signing_key() {
    let manager = ScriptedManager::with_password(PASSWORD);
    let (wallet, _vault) = new_wallet(manager.clone());
    wallet.add(Some(KEY_0)).await.unwrap();

    // no-op when nothing is cached
    wallet.delete_signing_key();
    assert!(!wallet.has_signing_key());

    wallet.activate(ADDRESS_0).await.unwrap();
    wallet.delete_signing_key();
    assert!(!wallet.has_signing_key());

    // the next read has to prompt again
    let prompts = manager.prompt_count();
    wallet.get_private_key(None).await.unwrap();
    assert_eq!(manager.prompt_count(), prompts + 1);
    assert_eq!(manager.last_action(), Some(WalletAction::PrivateKey));
}

#[tokio::test]
async fn test_point_read_does_not_touch_cache() {
    let manager = ScriptedManager::with_password(PASSWORD);
    let (wallet, _vault) = new_wallet(manager.clone());
    wallet.add(Some(KEY_0)).await.unwrap();
    wallet.add(Some(KEY_1)).await.unwrap();
    wallet.activate(ADDRESS_0).await.unwrap();

    let key = wallet.get_private_key(Some(ADDRESS_1)).await.unwrap();
    assert_eq!(key.expose_secret(), KEY_1);
    assert_eq!(manager.last_action(), Some(WalletAction::PrivateKey));
    assert_eq!(wallet.address().as_deref(), Some(ADDRESS_0));
    assert!(wallet.has_signing_key());

    // cache still holds account 0
    let prompts = manager.prompt_count();
    assert_eq!(wallet.get_private_key(None).await.unwrap().expose_secret(), KEY_0);
    assert_eq!(manager.prompt_count(), prompts);
}

#[tokio::test]
async fn test_point_read_without_active_address_keeps_pointer() {
    let manager = ScriptedManager::with_password(PASSWORD);
    manager.set_address(Some(ADDRESS_0));
    let (wallet, vault) = new_wallet(manager.clone());
    wallet.add(Some(TEST_MNEMONIC)).await.unwrap();
    let mut events = wallet.subscribe();

    let key = wallet.get_private_key(None).await.unwrap();
    let phrase = wallet.get_mnemonic(None).await.unwrap().unwrap();
    let json = wallet.get_encrypted_json(None).await.unwrap();

    assert_eq!(key.expose_secret(), KEY_0);
    assert_eq!(phrase.expose_secret(), TEST_MNEMONIC);
    assert!(json.contains("f39fd6e51aad88f6f4ce6ab8827279cfffb92266"));
    assert_eq!(manager.address_requests(), 3);

    assert!(wallet.address().is_none());
    assert!(vault.default_address().await.unwrap().is_none());
    assert!(!wallet.has_signing_key());
    while let Ok(event) = events.try_recv() {
        assert!(!matches!(event, WalletEvent::AddressChanged(_)), "unexpected {:?}", event);
    }
}

#[tokio::test]
async fn test_point_read_with_unknown_supplied_address() {
    let manager = ScriptedManager::with_password(PASSWORD);
    manager.set_address(Some(ADDRESS_1));
    let (wallet, _vault) = new_wallet(manager);
    wallet.add(Some(KEY_0)).await.unwrap();

    let err = wallet.get_private_key(None).await.unwrap_err();
    assert!(matches!(err, WalletError::AddressNotInWallet(_)));
    assert!(wallet.address().is_none());
}

#[tokio::test]
async fn test_get_mnemonic() {
    let manager = ScriptedManager::with_password(PASSWORD);
    let (wallet, _vault) = new_wallet(manager.clone());
    wallet.add(Some(TEST_MNEMONIC)).await.unwrap();
    wallet.add(Some(KEY_1)).await.unwrap();

    let phrase = wallet.get_mnemonic(Some(ADDRESS_0)).await.unwrap().unwrap();
    assert_eq!(phrase.expose_secret(), TEST_MNEMONIC);
    assert_eq!(manager.last_action(), Some(WalletAction::Mnemonic));

    assert!(wallet.get_mnemonic(Some(ADDRESS_1)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_encrypted_json() {
    let manager = ScriptedManager::with_password(PASSWORD);
    let (wallet, vault) = new_wallet(manager);
    wallet.add(Some(KEY_0)).await.unwrap();

    let json = wallet.get_encrypted_json(Some(ADDRESS_0)).await.unwrap();
    assert_eq!(Some(json.clone()), vault.keystore(ADDRESS_0).await.unwrap());
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["version"], 3);

    let err = wallet.get_encrypted_json(Some(ADDRESS_1)).await.unwrap_err();
    assert!(matches!(err, WalletError::AddressNotInWallet(_)));
}

#[tokio::test]
async fn test_set_active_switches_pointer_and_drops_other_key() {
    let manager = ScriptedManager::with_password(PASSWORD);
    let (wallet, vault) = new_wallet(manager);
    wallet.add(Some(KEY_0)).await.unwrap();
    wallet.add(Some(KEY_1)).await.unwrap();
    wallet.activate(ADDRESS_0).await.unwrap();

    wallet.set_active(ADDRESS_1).await.unwrap();
    assert_eq!(wallet.address().as_deref(), Some(ADDRESS_1));
    assert_eq!(vault.default_address().await.unwrap().as_deref(), Some(ADDRESS_1));
    assert!(!wallet.has_signing_key());

    let err = wallet.set_active("0x0000000000000000000000000000000000000001").await.unwrap_err();
    assert!(matches!(err, WalletError::AddressNotInWallet(_)));
    assert_eq!(wallet.address().as_deref(), Some(ADDRESS_1));
}

#[tokio::test]
async fn test_set_active_same_address_keeps_key() {
    let manager = ScriptedManager::with_password(PASSWORD);
    let (wallet, _vault) = new_wallet(manager);
    wallet.add(Some(KEY_0)).await.unwrap();
    wallet.activate(ADDRESS_0).await.unwrap();

    wallet.set_active(ADDRESS_0).await.unwrap();
    assert!(wallet.has_signing_key());
}

#[tokio::test]
async fn test_open_restores_index() {
    let manager = ScriptedManager::with_password(PASSWORD);
    let (wallet, vault) = new_wallet(manager.clone());
    wallet.add(Some(KEY_0)).await.unwrap();
    wallet.add(Some(KEY_1)).await.unwrap();
    wallet.set_active(ADDRESS_1).await.unwrap();

    let reopened = MultiAccountWallet::open(Arc::new(vault), manager, test_config()).await.unwrap();
    assert_eq!(reopened.accounts(), vec![ADDRESS_0.to_string(), ADDRESS_1.to_string()]);
    assert_eq!(reopened.address().as_deref(), Some(ADDRESS_1));
    assert!(!reopened.has_signing_key());
}

#[tokio::test]
async fn test_events_follow_commit_order() {
    let manager = ScriptedManager::with_password(PASSWORD);
    let (wallet, _vault) = new_wallet(manager);
    let mut events = wallet.subscribe();

    wallet.add(Some(KEY_0)).await.unwrap();
    wallet.activate(ADDRESS_0).await.unwrap();
    wallet.delete_signing_key();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    let progress = |p: Option<f32>| WalletEvent::EncryptingProgress(p);
    assert_eq!(
        seen,
        vec![
            progress(Some(0.0)),
            progress(Some(1.0)),
            progress(None),
            WalletEvent::AccountsChanged(vec![ADDRESS_0.to_string()]),
            progress(Some(0.0)),
            progress(Some(1.0)),
            progress(None),
            WalletEvent::SigningKeyChanged(true),
            WalletEvent::AddressChanged(Some(ADDRESS_0.to_string())),
            WalletEvent::SigningKeyChanged(false),
        ]
    );
    assert!(wallet.encrypting_progress().is_none());
}

#[tokio::test]
async fn test_failed_decrypt_resets_progress() {
    let manager = ScriptedManager::with_password(PASSWORD);
    let (wallet, _vault) = new_wallet(manager.clone());
    wallet.add(Some(KEY_0)).await.unwrap();
    let mut events = wallet.subscribe();

    manager.push(Reply::Password("wrong".into()));
    assert!(wallet.activate(ADDRESS_0).await.is_err());

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(
        seen,
        vec![WalletEvent::EncryptingProgress(Some(0.0)), WalletEvent::EncryptingProgress(None)]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_operations_are_serialised() {
    let manager = ScriptedManager::with_password(PASSWORD);
    let (wallet, _vault) = new_wallet(manager);
    wallet.add(Some(KEY_0)).await.unwrap();
    wallet.add(Some(KEY_1)).await.unwrap();
    let mut events = wallet.subscribe();

    let (a, b) = (wallet.clone(), wallet.clone());
    let (ra, rb) = tokio::join!(
        tokio::spawn(async move { a.activate(ADDRESS_0).await }),
        tokio::spawn(async move { b.activate(ADDRESS_1).await }),
    );
    ra.unwrap().unwrap();
    rb.unwrap().unwrap();

    // each KDF run completes before the next one starts
    let mut progress = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let WalletEvent::EncryptingProgress(p) = event {
            progress.push(p);
        }
    }
    assert_eq!(progress, vec![Some(0.0), Some(1.0), None, Some(0.0), Some(1.0), None]);

    // exactly one account is unlocked, and it is the active one
    assert!(wallet.has_signing_key());
    let active = wallet.address().unwrap();
    let key = wallet.get_private_key(Some(&active)).await.unwrap();
    let expected = if active == ADDRESS_0 { KEY_0 } else { KEY_1 };
    assert_eq!(key.expose_secret(), expected);
}
