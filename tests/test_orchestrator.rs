mod common;

#[cfg(test)]
mod orchestrator_flows {
    //! End-to-end vault flows against in-memory collaborators.
    //!
    //! The tests ensure:
    //! - Funding creates the source account only when it is missing
    //! - Multi-step intents become one transaction in dependency order
    //! - Liquidity paths without yield info raise `ProvideLiquidity`
    //! - Submission failures degrade to the user-facing messages
    //! - Listing and earnings queries value positions correctly
    //! - Operations on the same vault never submit concurrently

    use std::time::Duration;

    use rstest::rstest;
    use solana_instruction::Instruction;
    use solana_pubkey::Pubkey;
    use solana_sdk::signature::Signer;
    use spl_token::instruction::TokenInstruction;

    use savings_vault_client::{
        constants::*,
        errors::Error,
        orchestrator::VaultUpdate,
        program::anchor_discriminator,
        rpc::ConfirmationStatus,
        state::{EarningsErrorKind, SpareLevel},
    };

    use crate::common::*;

    const USDC: Pubkey = DEVNET_USDC_MINT;

    fn is_method(ix: &Instruction, method: &str) -> bool {
        ix.program_id == VAULT_PROGRAM && ix.data[..8] == anchor_discriminator(method)
    }

    fn trailing_u64(ix: &Instruction) -> u64 {
        let data = &ix.data[ix.data.len() - 8..];
        u64::from_le_bytes(data.try_into().unwrap())
    }

    #[tokio::test]
    async fn create_then_fund() {
        let h = harness(vec![], None);
        let created = h
            .orchestrator
            .create_vault("Savings", &USDC, SpareLevel::None, false)
            .await
            .unwrap();
        let create_ixs = instructions_of(&h.chain, &created.transaction).await;
        assert_eq!(create_ixs.len(), 1);
        assert!(is_method(&create_ixs[0], "create_vault"));
        assert_eq!(create_ixs[0].accounts[0].pubkey, h.owner());

        let vault = h.vault("3kTMd9QpXq", USDC, 6, SpareLevel::None, false);
        let source = h.owner_ata(&USDC);
        h.chain
            .set_account(source, token_account(USDC, h.owner(), 50_000_000));

        let funded = h.orchestrator.fund(&source, &vault, 10.5).await.unwrap();
        let ixs = instructions_of(&h.chain, &funded.transaction).await;
        assert_eq!(ixs.len(), 1);
        assert_eq!(ixs[0].program_id, TOKEN_PROGRAM);
        assert_eq!(ixs[0].accounts[2].pubkey, vault.account_address);
        match TokenInstruction::unpack(&ixs[0].data).unwrap() {
            TokenInstruction::TransferChecked { amount, decimals } => {
                assert_eq!(amount, 10_500_000);
                assert_eq!(decimals, 6);
            }
            other => panic!("unexpected token instruction {other:?}"),
        }
        assert_eq!(h.chain.submitted().len(), 2);
    }

    #[rstest]
    #[case(true, 1)]
    #[case(false, 2)]
    #[tokio::test]
    async fn fund_creates_missing_source_account(#[case] exists: bool, #[case] expected: usize) {
        let h = harness(vec![], None);
        let vault = h.vault("vault-1", USDC, 6, SpareLevel::None, false);
        let source = h.owner_ata(&USDC);
        if exists {
            h.chain
                .set_account(source, token_account(USDC, h.owner(), 1_000_000));
        }

        let tx = h.orchestrator.fund_tx(&source, &vault, 1_000_000).await.unwrap();
        let ixs = instructions_of(&h.chain, &tx).await;
        assert_eq!(ixs.len(), expected);
        assert_eq!(
            ixs.iter().filter(|ix| ix.program_id == ATA_PROGRAM).count(),
            expected - 1
        );
        assert_eq!(ixs.last().unwrap().program_id, TOKEN_PROGRAM);
    }

    #[tokio::test]
    async fn fund_from_unknown_missing_account_fails() {
        let h = harness(vec![], None);
        let vault = h.vault("vault-1", USDC, 6, SpareLevel::None, false);
        let stranger = Pubkey::new_unique();

        let err = h.orchestrator.fund_tx(&stranger, &vault, 1).await.unwrap_err();
        assert!(matches!(err, Error::NoAccountFound(address) if address == stranger));

        let degraded = h.orchestrator.fund(&stranger, &vault, 1.0).await.unwrap_err();
        assert_eq!(degraded.message, UNEXPECTED_ERROR_MESSAGE);
        assert!(h.chain.submitted().is_empty());
    }

    #[tokio::test]
    async fn payer_without_lamports_gets_no_sol_message() {
        let info = vault_info(&USDC, "1.0");
        let h = harness(vec![info.clone()], None);
        let vault = h.vault("vault-1", USDC, 6, SpareLevel::None, true);
        h.store_lp_position(&vault, &info, 0, 6);
        let source = h.owner_ata(&USDC);
        h.chain.set_account(source, token_account(USDC, h.owner(), 0));
        h.chain.airdrop(h.owner(), 0);

        let err = h
            .orchestrator
            .fund_and_provide_liquidity(&source, &vault, 1.0)
            .await
            .unwrap_err();
        assert_eq!(err.message, NO_SOL_FUNDS_MESSAGE);
        assert!(matches!(
            err.source.as_deref(),
            Some(Error::Submission(message)) if message.contains(NO_PRIOR_CREDIT_SIGNAL)
        ));
    }

    #[tokio::test]
    async fn fund_and_provide_liquidity_is_one_transaction() {
        let info = vault_info(&USDC, "1.0");
        let h = harness(vec![info.clone()], None);
        let vault = h.vault("vault-1", USDC, 6, SpareLevel::None, true);
        let source = h.owner_ata(&USDC);
        h.chain
            .set_account(source, token_account(USDC, h.owner(), 9_000_000));

        // No LP account yet: it is created inside the liquidity step.
        let tx = h
            .orchestrator
            .fund_and_provide_liquidity_tx(&source, &vault, 2_000_000)
            .await
            .unwrap();
        let ixs = instructions_of(&h.chain, &tx).await;
        assert_eq!(ixs.len(), 3);
        assert_eq!(ixs[0].program_id, TOKEN_PROGRAM);
        assert_eq!(ixs[1].program_id, ATA_PROGRAM);
        assert!(is_method(&ixs[2], "deposit_liquidity"));
        assert_eq!(trailing_u64(&ixs[2]), 2_000_000);
    }

    #[tokio::test]
    async fn missing_yield_info_propagates_from_builders() {
        let h = harness(vec![], None);
        let vault = h.vault("vault-1", USDC, 6, SpareLevel::Spare, true);
        h.store_vaults(&[vault.clone()]);
        let source = h.owner_ata(&USDC);
        h.chain.set_account(source, token_account(USDC, h.owner(), 5));

        let err = h.orchestrator.provide_liquidity_tx(&vault, 1).await.unwrap_err();
        assert!(matches!(err, Error::ProvideLiquidity(token) if token == USDC));

        let err = h
            .orchestrator
            .send_token_to_vault_with_spare(5, &USDC, 6, &source)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProvideLiquidity(_)));

        // Submitting operations still return the tagged error.
        let degraded = h.orchestrator.provide_liquidity(&vault, 1.0).await.unwrap_err();
        assert_eq!(degraded.message, UNEXPECTED_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn swap_then_deposit_is_a_four_step_merge() {
        init_test_logger();
        let info = vault_info(&USDC, "1.0");
        let swap_program = Pubkey::new_unique();
        let table = Pubkey::new_unique();
        let (pool_a, pool_b) = (Pubkey::new_unique(), Pubkey::new_unique());
        let route = fragment(
            vec![Instruction::new_with_bytes(
                swap_program,
                &[7, 7, 7],
                vec![
                    solana_instruction::AccountMeta::new(pool_a, false),
                    solana_instruction::AccountMeta::new_readonly(pool_b, false),
                ],
            )],
            vec![table],
        );
        let h = harness(vec![info.clone()], Some(route));
        h.chain.add_lookup_table(table, &[pool_a, pool_b]);

        let vault = h.vault("vault-1", USDC, 6, SpareLevel::Spare, true);
        h.store_vaults(&[vault.clone()]);
        h.store_lp_position(&vault, &info, 1_000_000, 6);

        let tx = h
            .orchestrator
            .send_token_to_vault_with_spare(
                LAMPORTS_PER_SOL,
                &NATIVE_MINT,
                9,
                &h.owner_ata(&NATIVE_MINT),
            )
            .await
            .unwrap()
            .expect("a swap route exists");

        let ixs = instructions_of(&h.chain, &tx).await;
        // create ATA + save ledger + swap + (deposit + liquidity)
        assert_eq!(ixs.len(), 1 + 1 + 1 + 2);
        assert_eq!(ixs[0].program_id, ATA_PROGRAM);
        assert!(is_method(&ixs[1], "save_account_balance"));
        assert_eq!(ixs[2].program_id, swap_program);
        assert!(is_method(&ixs[3], "deposit_to_vault_with_diff_balance"));
        assert!(is_method(&ixs[4], "deposit_liquidity_with_diff_balance"));
        assert_eq!(tx.referenced_lookup_tables(), vec![table]);
        assert!(h.chain.submitted().is_empty());
    }

    #[tokio::test]
    async fn swap_skips_existing_token_account() {
        let route = fragment(
            vec![Instruction::new_with_bytes(Pubkey::new_unique(), &[1], vec![])],
            vec![],
        );
        let h = harness(vec![], Some(route));
        let vault = h.vault("vault-1", USDC, 6, SpareLevel::Spare2X, false);
        h.store_vaults(&[vault.clone()]);
        let user_ata = h.owner_ata(&USDC);
        h.chain.set_account(user_ata, token_account(USDC, h.owner(), 0));

        let tx = h
            .orchestrator
            .send_token_to_vault_with_spare(1_000, &USDT_MINT, 6, &h.owner_ata(&USDT_MINT))
            .await
            .unwrap()
            .unwrap();
        let ixs = instructions_of(&h.chain, &tx).await;
        assert_eq!(ixs.len(), 3);
        assert!(is_method(&ixs[0], "save_account_balance"));
        assert!(is_method(&ixs[2], "deposit_to_vault_with_diff_balance"));
    }

    #[tokio::test]
    async fn spare_routing_without_a_route_or_vault_yields_none() {
        let h = harness(vec![], None);
        let source = h.owner_ata(&NATIVE_MINT);
        assert!(h
            .orchestrator
            .send_token_to_vault_with_spare(1, &NATIVE_MINT, 9, &source)
            .await
            .unwrap()
            .is_none());

        let vault = h.vault("vault-1", USDC, 6, SpareLevel::Spare, false);
        h.store_vaults(&[vault]);
        assert!(h
            .orchestrator
            .send_token_to_vault_with_spare(1, &NATIVE_MINT, 9, &source)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn spare_routing_same_token_funds_directly() {
        let h = harness(vec![], None);
        let idle = h.vault("vault-0", USDC, 6, SpareLevel::None, false);
        let spare = h.vault("vault-1", USDC, 6, SpareLevel::Spare3X, false);
        h.store_vaults(&[idle, spare.clone()]);
        let source = h.owner_ata(&USDC);
        h.chain.set_account(source, token_account(USDC, h.owner(), 7_000_000));

        let tx = h
            .orchestrator
            .send_token_to_vault_with_spare(7_000_000, &USDC, 6, &source)
            .await
            .unwrap()
            .unwrap();
        let ixs = instructions_of(&h.chain, &tx).await;
        assert_eq!(ixs.len(), 1);
        assert_eq!(ixs[0].accounts[2].pubkey, spare.account_address);
        match TokenInstruction::unpack(&ixs[0].data).unwrap() {
            TokenInstruction::TransferChecked { amount, .. } => assert_eq!(amount, 7_000_000),
            other => panic!("unexpected token instruction {other:?}"),
        }
    }

    #[tokio::test]
    async fn withdraw_liquidity_and_withdraw_prefunds_wrapped_sol() {
        let info = vault_info(&NATIVE_MINT, "1.0");
        let h = harness(vec![info.clone()], None);
        let vault = h.vault("sol-vault", NATIVE_MINT, 9, SpareLevel::None, true);
        h.store_lp_position(&vault, &info, 900_000_000, 9);
        let destination = h.owner_ata(&NATIVE_MINT);

        let success = h
            .orchestrator
            .withdraw_liquidity_and_withdraw(&h.owner(), &destination, &vault, 400_000_000, 0.5)
            .await
            .unwrap();
        let ixs = instructions_of(&h.chain, &success.transaction).await;
        assert_eq!(ixs.len(), 5);
        assert_eq!(ixs[0].program_id, ATA_PROGRAM);
        assert_eq!(ixs[1].program_id, SYSTEM_PROGRAM);
        assert_eq!(transfer_lamports(&ixs[1].data), Some(500_000_000));
        assert_eq!(ixs[2].program_id, TOKEN_PROGRAM);
        assert!(is_method(&ixs[3], "withdraw_liquidity"));
        assert_eq!(trailing_u64(&ixs[3]), 400_000_000);
        assert!(is_method(&ixs[4], "withdraw_from_vault"));
        assert_eq!(trailing_u64(&ixs[4]), 500_000_000);
    }

    /// Lamports of a system transfer: u32 tag 2, then the amount.
    fn transfer_lamports(data: &[u8]) -> Option<u64> {
        let tag = u32::from_le_bytes(data.get(..4)?.try_into().ok()?);
        let lamports = u64::from_le_bytes(data.get(4..12)?.try_into().ok()?);
        (tag == 2).then_some(lamports)
    }

    #[tokio::test]
    async fn withdraw_converts_ui_amount() {
        let h = harness(vec![], None);
        let vault = h.vault("vault-1", USDC, 6, SpareLevel::None, false);
        let destination = h.owner_ata(&USDC);

        let success = h
            .orchestrator
            .withdraw(&destination, &vault, 2.25)
            .await
            .unwrap();
        let ixs = instructions_of(&h.chain, &success.transaction).await;
        assert_eq!(ixs.len(), 1);
        assert!(is_method(&ixs[0], "withdraw_from_vault"));
        assert_eq!(trailing_u64(&ixs[0]), 2_250_000);
    }

    #[tokio::test]
    async fn moving_everything_to_liquidity_uses_the_vault_balance() {
        let info = vault_info(&USDC, "1.0");
        let h = harness(vec![info.clone()], None);
        let vault = h.vault("vault-1", USDC, 6, SpareLevel::None, false);
        h.store_lp_position(&vault, &info, 0, 6);
        h.chain.set_account(
            vault.account_address,
            token_account(USDC, vault.owner_address, 5_000_000),
        );
        let update = VaultUpdate {
            name: "Savings".to_string(),
            token: USDC,
            spare: SpareLevel::None,
            earnings_enabled: true,
        };

        let success = h
            .orchestrator
            .update_vault_and_move_all_to_liquidity(&vault, &update)
            .await
            .unwrap();
        let ixs = instructions_of(&h.chain, &success.transaction).await;
        assert_eq!(ixs.len(), 2);
        assert!(is_method(&ixs[0], "update_vault"));
        assert_eq!(*ixs[0].data.last().unwrap(), 1);
        assert!(is_method(&ixs[1], "deposit_liquidity"));
        assert_eq!(trailing_u64(&ixs[1]), 5_000_000);
    }

    #[tokio::test]
    async fn withdrawing_everything_redeems_before_updating() {
        let info = vault_info(&USDC, "1.2");
        let h = harness(vec![info.clone()], None);
        let vault = h.vault("vault-1", USDC, 6, SpareLevel::None, true);
        h.store_lp_position(&vault, &info, 7_000, 6);
        let update = VaultUpdate {
            name: "Savings".to_string(),
            token: USDC,
            spare: SpareLevel::None,
            earnings_enabled: false,
        };

        let success = h
            .orchestrator
            .update_vault_and_withdraw_all_from_liquidity(&vault, &update)
            .await
            .unwrap();
        let ixs = instructions_of(&h.chain, &success.transaction).await;
        assert_eq!(ixs.len(), 2);
        assert!(is_method(&ixs[0], "withdraw_liquidity"));
        assert_eq!(trailing_u64(&ixs[0]), 7_000);
        assert!(is_method(&ixs[1], "update_vault"));
    }

    #[rstest]
    #[case(true, 1)]
    #[case(false, 2)]
    #[tokio::test]
    async fn delete_vault_creates_missing_destination(
        #[case] exists: bool,
        #[case] expected: usize,
    ) {
        let h = harness(vec![], None);
        let vault = h.vault("vault-1", USDC, 6, SpareLevel::None, false);
        if exists {
            h.chain
                .set_account(h.owner_ata(&USDC), token_account(USDC, h.owner(), 0));
        }
        let success = h.orchestrator.delete_vault(&vault).await.unwrap();
        let ixs = instructions_of(&h.chain, &success.transaction).await;
        assert_eq!(ixs.len(), expected);
        assert!(is_method(ixs.last().unwrap(), "delete_vault"));
    }

    #[tokio::test]
    async fn unpublished_interface_degrades_to_unexpected_error() {
        let h = harness(vec![], None);
        h.chain
            .remove_account(&savings_vault_client::program::anchor_idl_address(&VAULT_PROGRAM).unwrap());
        let err = h
            .orchestrator
            .create_vault("Savings", &USDC, SpareLevel::None, false)
            .await
            .unwrap_err();
        assert_eq!(err.message, UNEXPECTED_ERROR_MESSAGE);
        assert!(matches!(
            err.source.as_deref(),
            Some(Error::ProgramInterfaceUnavailable(program)) if *program == VAULT_PROGRAM
        ));
    }

    #[tokio::test]
    async fn earnings_value_the_lp_position() {
        let info = vault_info(&USDC, "1.5");
        let h = harness(vec![info.clone()], None);
        let vault = h.vault("vault-1", USDC, 6, SpareLevel::None, true);

        let err = h.orchestrator.get_investments_data(&vault).await.unwrap_err();
        assert_eq!(err.kind, EarningsErrorKind::UserNotActive);

        h.store_lp_position(&vault, &info, 2_000_000, 6);
        let earnings = h.orchestrator.get_investments_data(&vault).await.unwrap();
        assert_eq!(earnings.amount_in_tokens, 3.0);
        assert_eq!(earnings.amount_lp_tokens, 2_000_000);
        assert_eq!(earnings.lp_token_decimals, 6);
        assert_eq!(earnings.virtual_price, 1.5);
        assert_eq!(
            (earnings.one_hour_apy, earnings.average_apy, earnings.seven_days_apy),
            (4.0, 5.0, 6.0)
        );
        assert_eq!(h.orchestrator.get_updated_balance(&vault).await, Some(3.0));

        let other = h.vault("vault-2", USDT_MINT, 6, SpareLevel::None, true);
        let err = h.orchestrator.get_investments_data(&other).await.unwrap_err();
        assert_eq!(err.kind, EarningsErrorKind::VaultNotLoaded);
        assert_eq!(h.orchestrator.get_updated_balance(&other).await, None);
    }

    #[tokio::test]
    async fn load_vaults_applies_the_balance_policy() {
        let usdc_info = vault_info(&USDC, "1.5");
        let usdt_info = vault_info(&USDT_MINT, "1.1");
        let h = harness(vec![usdc_info.clone(), usdt_info], None);

        let earning = h.vault("vault-1", USDC, 6, SpareLevel::Spare, true);
        let holding = h.vault("vault-2", USDT_MINT, 6, SpareLevel::None, false);
        h.store_vaults(&[earning.clone(), holding.clone()]);
        h.store_lp_position(&earning, &usdc_info, 2_000_000, 6);
        h.chain.set_account(USDT_MINT, mint_account(6));
        h.chain.set_account(
            holding.account_address,
            token_account(USDT_MINT, holding.owner_address, 12_345_678),
        );

        let vaults = h.orchestrator.load_vaults().await;
        assert_eq!(vaults.len(), 2);

        let first = &vaults[0];
        assert_eq!(first.identifier, "vault-1");
        assert_eq!(first.symbol.as_deref(), Some("USDC"));
        assert_eq!(first.token_decimals, 6);
        assert_eq!(first.balance, 3.0);
        assert_eq!(first.earnings.as_ref().unwrap().amount_lp_tokens, 2_000_000);

        let second = &vaults[1];
        assert_eq!(second.balance, 12.35);
        let idle = second.earnings.as_ref().unwrap();
        assert_eq!(idle.amount_in_tokens, 0.0);
        assert_eq!(idle.virtual_price, 1.1);

        assert_eq!(h.orchestrator.get_updated_balance(second).await, Some(12.34));
        assert_eq!(h.orchestrator.get_token_apy(&USDT_MINT).await, Some(5.0));
        assert_eq!(h.orchestrator.get_token_apy(&NATIVE_MINT).await, None);
    }

    #[tokio::test]
    async fn load_vaults_failures_yield_an_empty_list() {
        let h = harness(vec![], None);
        assert!(h.orchestrator.load_vaults().await.is_empty());

        let data_account = h.orchestrator.addresses().data_account().unwrap();
        let mut corrupt = token_account(USDC, h.owner(), 0);
        corrupt.data.truncate(20);
        h.chain.set_account(data_account, corrupt);
        assert!(h.orchestrator.load_vaults().await.is_empty());
    }

    #[tokio::test]
    async fn submitted_transactions_confirm() {
        let h = harness(vec![], None);
        let vault = h.vault("vault-1", USDC, 6, SpareLevel::None, false);
        let update = VaultUpdate {
            name: "Renamed".to_string(),
            token: USDC,
            spare: SpareLevel::Spare,
            earnings_enabled: false,
        };
        let success = h.orchestrator.update_vault(&vault, &update).await.unwrap();
        assert_eq!(
            Some(&success.signature),
            success.transaction.signature()
        );

        let status = h
            .orchestrator
            .wait_for_confirmation(&success.signature, &success.transaction.anchor)
            .await
            .unwrap();
        assert_eq!(status, ConfirmationStatus::Confirmed);

        let stray = solana_sdk::signature::Signature::new_unique();
        let status = h
            .orchestrator
            .wait_for_confirmation(&stray, &success.transaction.anchor)
            .await
            .unwrap();
        assert_eq!(status, ConfirmationStatus::Pending);
    }

    #[tokio::test]
    async fn built_transactions_can_be_submitted_later() {
        let h = harness(vec![], None);
        let vault = h.vault("vault-1", USDC, 6, SpareLevel::None, false);
        let tx = h
            .orchestrator
            .withdraw_tx(&h.owner_ata(&USDC), &vault, 10)
            .await
            .unwrap();
        assert!(h.chain.submitted().is_empty());

        let success = h.orchestrator.submit(tx.clone()).await.unwrap();
        assert_eq!(success.transaction, tx);
        assert_eq!(h.chain.submitted().len(), 1);
        assert_eq!(
            h.chain.submitted()[0].message.static_account_keys()[0],
            h.signer.pubkey()
        );
    }

    #[tokio::test]
    async fn allowed_tokens_filter_the_token_list() {
        let h = harness(vec![], None);
        let symbols: Vec<&str> = h
            .orchestrator
            .tokens()
            .iter()
            .map(|t| t.symbol.as_str())
            .collect();
        assert_eq!(symbols, vec!["USDC", "SOL"]);
    }

    #[tokio::test]
    async fn slow_submission_degrades_to_a_timeout() {
        let config = savings_vault_client::VaultsConfig {
            submit_timeout_ms: 20,
            ..test_config()
        };
        let h = harness_with(config, vec![], None);
        h.chain.stall_submit(Duration::from_secs(5));
        let vault = h.vault("vault-1", USDC, 6, SpareLevel::None, false);

        let err = h
            .orchestrator
            .withdraw(&h.owner_ata(&USDC), &vault, 1.0)
            .await
            .unwrap_err();
        assert_eq!(err.message, UNEXPECTED_ERROR_MESSAGE);
        assert!(matches!(
            err.source.as_deref(),
            Some(Error::Timeout { operation: "submit", .. })
        ));
        assert!(h.chain.submitted().is_empty());
    }

    #[rstest]
    #[case("vault-1", 1)]
    #[case("vault-2", 2)]
    #[tokio::test]
    async fn funding_the_same_vault_is_serialized(
        #[case] second_identifier: &str,
        #[case] max_concurrent: usize,
    ) {
        let h = harness(vec![], None);
        h.chain.stall_submit(Duration::from_millis(50));
        let first = h.vault("vault-1", USDC, 6, SpareLevel::None, false);
        let second = h.vault(second_identifier, USDC, 6, SpareLevel::None, false);
        let source = h.owner_ata(&USDC);
        h.chain
            .set_account(source, token_account(USDC, h.owner(), 10_000_000));

        let (a, b) = tokio::join!(
            h.orchestrator.fund(&source, &first, 1.0),
            h.orchestrator.fund(&source, &second, 2.0),
        );
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(h.chain.submitted().len(), 2);
        assert_eq!(h.chain.max_concurrent_submits(), max_concurrent);
    }

    #[tokio::test]
    async fn unreachable_interface_is_reported_and_retried() {
        let h = harness(vec![], None);
        let idl = savings_vault_client::program::anchor_idl_address(&VAULT_PROGRAM).unwrap();
        h.chain.make_unreachable(idl);

        let err = h
            .orchestrator
            .create_vault("Savings", &USDC, SpareLevel::None, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err.source.as_deref(),
            Some(Error::ProgramInterfaceUnavailable(program)) if *program == VAULT_PROGRAM
        ));

        h.chain.restore(&idl);
        assert!(
            h.orchestrator
                .create_vault("Savings", &USDC, SpareLevel::None, false)
                .await
                .is_ok()
        );
    }
}
