use std::{collections::HashMap, sync::Arc};

use futures::future::{join_all, try_join_all};
use log::{debug, error, info, warn};
use solana_instruction::Instruction;
use solana_pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};

use crate::{
    assembler::TransactionAssembler,
    config::VaultsConfig,
    constants::*,
    derive::VaultAddresses,
    errors::{Error, Result, VaultError},
    fragment::{AssembledTransaction, Fragment, InstructionSet, UnsignedFragment},
    info::{HttpVaultInfoSource, VaultInfo, VaultInfoCache, VaultInfoSource},
    locks::VaultLocks,
    math::{balance_in_cents, from_base_units, round_to_n_decimals, sol_to_lamports, to_base_units},
    merger::TransactionMerger,
    program::{
        AccountRole, AnchorProgramAdapter, CapabilityRequest, InstructionBuilder, ProgramAdapter,
        ResolvedAccounts,
    },
    rpc::{ChainRpc, ConfirmationStatus, FreshnessAnchor, SolanaRpc},
    state::{
        EarningsError, SpareLevel, TokenMetadata, VaultDescriptor, VaultEarningsData,
        VaultManagerAccount,
    },
    submit::TransactionSubmitter,
    swap::{JupiterClient, SwapAggregator},
    token::{
        associated_token_address, create_associated_token_account, decode_mint_decimals,
        decode_token_account, transfer_checked, wrap_sol,
    },
    yield_protocol::{YieldProtocol, idle_earnings},
};

/// A submitted transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxSuccess {
    pub signature: Signature,
    pub transaction: AssembledTransaction,
}

/// New settings for an existing vault.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VaultUpdate {
    pub name: String,
    pub token: Pubkey,
    pub spare: SpareLevel,
    pub earnings_enabled: bool,
}

/// External services the orchestrator talks to.
pub struct Collaborators {
    pub rpc: Arc<dyn ChainRpc>,
    pub program: Arc<dyn ProgramAdapter>,
    pub info: Arc<dyn VaultInfoSource>,
    pub swap: Arc<dyn SwapAggregator>,
}

impl Collaborators {
    /// Network-backed collaborators for `config`.
    pub fn from_config(config: &VaultsConfig) -> Self {
        let rpc: Arc<dyn ChainRpc> = Arc::new(SolanaRpc::new(config.rpc_url.clone()));
        Self {
            program: Arc::new(AnchorProgramAdapter::new(rpc.clone())),
            info: Arc::new(HttpVaultInfoSource::new(config.vault_info_url.clone())),
            swap: Arc::new(JupiterClient::new(
                config.swap_api_url.clone(),
                config.swap_max_accounts,
            )),
            rpc,
        }
    }
}

/// One operation per user intent over the owner's vaults.
///
/// `*_tx` methods build and sign without submitting and return typed
/// errors. Submitting methods hold the vault's lock, log the typed error and
/// return a `VaultError`.
pub struct VaultOrchestrator {
    config: VaultsConfig,
    signer: Arc<Keypair>,
    addresses: VaultAddresses,
    rpc: Arc<dyn ChainRpc>,
    builder: InstructionBuilder,
    assembler: TransactionAssembler,
    merger: TransactionMerger,
    submitter: TransactionSubmitter,
    yield_protocol: YieldProtocol,
    swap: Arc<dyn SwapAggregator>,
    tokens: Vec<TokenMetadata>,
    locks: VaultLocks,
}

impl VaultOrchestrator {
    pub fn new(
        config: VaultsConfig,
        signer: Arc<Keypair>,
        collaborators: Collaborators,
        tokens: Vec<TokenMetadata>,
    ) -> Self {
        let Collaborators {
            rpc,
            program,
            info,
            swap,
        } = collaborators;
        let assembler = TransactionAssembler::new(rpc.clone(), config.anchor_timeout());
        let info = Arc::new(VaultInfoCache::new(info, config.info_cache_ttl()));
        Self {
            addresses: VaultAddresses::new(signer.pubkey(), config.vault_program),
            builder: InstructionBuilder::new(config.vault_program, program),
            merger: TransactionMerger::new(assembler.clone()),
            submitter: TransactionSubmitter::new(rpc.clone(), &config),
            yield_protocol: YieldProtocol::new(config.yield_vault_program, info, rpc.clone()),
            assembler,
            rpc,
            swap,
            tokens,
            locks: VaultLocks::new(),
            signer,
            config,
        }
    }

    pub fn from_config(
        config: VaultsConfig,
        signer: Arc<Keypair>,
        tokens: Vec<TokenMetadata>,
    ) -> Result<Self> {
        config.validate()?;
        let collaborators = Collaborators::from_config(&config);
        Ok(Self::new(config, signer, collaborators, tokens))
    }

    pub fn owner(&self) -> Pubkey {
        self.signer.pubkey()
    }

    pub fn config(&self) -> &VaultsConfig {
        &self.config
    }

    pub fn addresses(&self) -> &VaultAddresses {
        &self.addresses
    }

    /// Known tokens a vault may be created for.
    pub fn tokens(&self) -> Vec<&TokenMetadata> {
        self.tokens
            .iter()
            .filter(|t| self.config.is_allowed_token(&t.address))
            .collect()
    }

    async fn assemble(&self, instructions: InstructionSet) -> Result<AssembledTransaction> {
        let signers: [&dyn Signer; 1] = [self.signer.as_ref()];
        self.assembler
            .assemble(&UnsignedFragment::from(instructions), &self.owner(), &signers)
            .await
    }

    async fn merge(&self, fragments: Vec<Fragment>) -> Result<AssembledTransaction> {
        let signers: [&dyn Signer; 1] = [self.signer.as_ref()];
        self.merger.merge(fragments, &self.owner(), &signers).await
    }

    async fn send(&self, transaction: AssembledTransaction) -> Result<TxSuccess> {
        let signature = self.submitter.submit(&transaction).await?;
        Ok(TxSuccess {
            signature,
            transaction,
        })
    }

    fn degrade<T>(operation: &str, result: Result<T>) -> Result<T, VaultError> {
        result.map_err(|e| {
            error!("{operation} failed: {e}");
            VaultError::from_error(e)
        })
    }

    /// Owner, data account and the vault's PDAs, plus the common programs.
    fn vault_accounts(&self, identifier: &str, mint: &Pubkey) -> Result<ResolvedAccounts> {
        let id = identifier.as_bytes();
        Ok(ResolvedAccounts::with_programs()
            .with(AccountRole::Owner, self.owner())
            .with(AccountRole::DataAccount, self.addresses.data_account()?)
            .with(AccountRole::VaultAccount, self.addresses.vault_account(id)?)
            .with(
                AccountRole::VaultAccountOwner,
                self.addresses.vault_account_owner(id)?,
            )
            .with(AccountRole::Mint, *mint))
    }

    async fn token_amount(&self, address: &Pubkey) -> Result<u64> {
        let account = self
            .rpc
            .get_account(address)
            .await?
            .ok_or(Error::NoAccountFound(*address))?;
        Ok(decode_token_account(address, &account)?.amount)
    }

    fn new_identifier() -> String {
        bs58::encode(rand::random::<[u8; 16]>()).into_string()
    }

    pub async fn create_vault(
        &self,
        name: &str,
        token: &Pubkey,
        spare: SpareLevel,
        earnings_enabled: bool,
    ) -> Result<TxSuccess, VaultError> {
        let identifier = Self::new_identifier();
        info!("creating vault {name} ({identifier}) for {token}");
        Self::degrade("create vault", async {
            let accounts = self.vault_accounts(&identifier, token)?;
            let request = CapabilityRequest::CreateVault {
                name: name.to_string(),
                identifier: identifier.clone(),
                spare,
                earnings_enabled,
            };
            let instructions = self.builder.build(&request, &accounts).await?;
            self.send(self.assemble(instructions).await?).await
        }
        .await)
    }

    pub async fn update_vault_tx(
        &self,
        vault: &VaultDescriptor,
        update: &VaultUpdate,
    ) -> Result<AssembledTransaction> {
        let accounts = self.vault_accounts(&vault.identifier, &update.token)?;
        let request = CapabilityRequest::UpdateVault {
            identifier: vault.identifier.clone(),
            name: update.name.clone(),
            spare: update.spare,
            earnings_enabled: update.earnings_enabled,
        };
        self.assemble(self.builder.build(&request, &accounts).await?)
            .await
    }

    pub async fn update_vault(
        &self,
        vault: &VaultDescriptor,
        update: &VaultUpdate,
    ) -> Result<TxSuccess, VaultError> {
        let _guard = self.locks.acquire(&vault.identifier).await;
        Self::degrade("update vault", async {
            self.send(self.update_vault_tx(vault, update).await?).await
        }
        .await)
    }

    /// Close the vault; what remains is returned to the owner's token
    /// account, created in the same transaction when missing.
    pub async fn delete_vault(&self, vault: &VaultDescriptor) -> Result<TxSuccess, VaultError> {
        let _guard = self.locks.acquire(&vault.identifier).await;
        Self::degrade("delete vault", async {
            let owner = self.owner();
            let destination =
                associated_token_address(&owner, &vault.token_address, &TOKEN_PROGRAM);
            let mut instructions = InstructionSet::default();
            if self.rpc.get_account(&destination).await?.is_none() {
                instructions.extend(
                    create_associated_token_account(
                        &owner,
                        &owner,
                        &vault.token_address,
                        &TOKEN_PROGRAM,
                    )
                    .into(),
                );
            }

            let accounts = self
                .vault_accounts(&vault.identifier, &vault.token_address)?
                .with(AccountRole::UserTokenAccount, destination);
            let request = CapabilityRequest::DeleteVault {
                identifier: vault.identifier.clone(),
            };
            instructions.extend(self.builder.build(&request, &accounts).await?);
            self.send(self.assemble(instructions).await?).await
        }
        .await)
    }

    /// Checkpoint `user_token_account`'s balance for a later diff-balance
    /// deposit.
    pub async fn save_on_ledger_tx(
        &self,
        vault: &VaultDescriptor,
        user_token_account: &Pubkey,
    ) -> Result<AssembledTransaction> {
        let accounts = ResolvedAccounts::with_programs()
            .with(AccountRole::Owner, self.owner())
            .with(AccountRole::Mint, vault.token_address)
            .with(AccountRole::UserTokenAccount, *user_token_account)
            .with(AccountRole::LedgerData, self.addresses.ledger_account()?);
        self.assemble(
            self.builder
                .build(&CapabilityRequest::SaveLedgerBalance, &accounts)
                .await?,
        )
        .await
    }

    /// A yield-vault instruction for `vault`, preceded by the creation of the
    /// LP account when needed.
    async fn liquidity_step(
        &self,
        vault: &VaultDescriptor,
        request: CapabilityRequest,
    ) -> Result<InstructionSet> {
        let lp_owner = self
            .addresses
            .vault_account_owner(vault.identifier_bytes())?;
        let liquidity = self
            .yield_protocol
            .liquidity_accounts(&vault.token_address, &lp_owner, &self.owner())
            .await?
            .ok_or(Error::ProvideLiquidity(vault.token_address))?;

        let mut accounts = self.vault_accounts(&vault.identifier, &vault.token_address)?;
        let vault_account = *accounts
            .get(AccountRole::VaultAccount)
            .ok_or(Error::AccountResolution(AccountRole::VaultAccount))?;
        accounts.insert(AccountRole::User, lp_owner);
        accounts.insert(AccountRole::UserToken, vault_account);
        accounts.insert(AccountRole::LedgerData, self.addresses.ledger_account()?);
        liquidity.apply(&mut accounts);

        let mut instructions = InstructionSet::default();
        if let Some(create) = liquidity.create_user_lp {
            instructions.extend(create.into());
        }
        instructions.extend(self.builder.build(&request, &accounts).await?);
        Ok(instructions)
    }

    /// Move `amount` base units from the vault account into the yield vault.
    pub async fn provide_liquidity_tx(
        &self,
        vault: &VaultDescriptor,
        amount: u64,
    ) -> Result<AssembledTransaction> {
        let request = CapabilityRequest::DepositLiquidity {
            identifier: vault.identifier.clone(),
            amount,
        };
        self.assemble(self.liquidity_step(vault, request).await?)
            .await
    }

    /// Move whatever the last diff-balance deposit brought in into the yield
    /// vault.
    pub async fn provide_liquidity_with_diff_balance_tx(
        &self,
        vault: &VaultDescriptor,
    ) -> Result<AssembledTransaction> {
        let request = CapabilityRequest::DepositLiquidityWithDiffBalance {
            identifier: vault.identifier.clone(),
        };
        self.assemble(self.liquidity_step(vault, request).await?)
            .await
    }

    pub async fn provide_liquidity(
        &self,
        vault: &VaultDescriptor,
        amount: f64,
    ) -> Result<TxSuccess, VaultError> {
        let _guard = self.locks.acquire(&vault.identifier).await;
        Self::degrade("provide liquidity", async {
            let amount = to_base_units(amount, vault.token_decimals)?;
            self.send(self.provide_liquidity_tx(vault, amount).await?)
                .await
        }
        .await)
    }

    /// LP tokens to redeem, in base units.
    pub async fn withdraw_liquidity_tx(
        &self,
        vault: &VaultDescriptor,
        lp_amount: u64,
    ) -> Result<AssembledTransaction> {
        let request = CapabilityRequest::WithdrawLiquidity {
            identifier: vault.identifier.clone(),
            lp_amount,
        };
        self.assemble(self.liquidity_step(vault, request).await?)
            .await
    }

    pub async fn withdraw_liquidity(
        &self,
        vault: &VaultDescriptor,
        lp_amount: u64,
    ) -> Result<TxSuccess, VaultError> {
        let _guard = self.locks.acquire(&vault.identifier).await;
        Self::degrade("withdraw liquidity", async {
            self.send(self.withdraw_liquidity_tx(vault, lp_amount).await?)
                .await
        }
        .await)
    }

    /// Deposit into the vault what `user_token_account` gained since the
    /// ledger checkpoint.
    pub async fn fund_with_diff_balance_tx(
        &self,
        vault: &VaultDescriptor,
        user_token_account: &Pubkey,
    ) -> Result<AssembledTransaction> {
        let accounts = self
            .vault_accounts(&vault.identifier, &vault.token_address)?
            .with(AccountRole::UserTokenAccount, *user_token_account)
            .with(AccountRole::LedgerData, self.addresses.ledger_account()?);
        let request = CapabilityRequest::DepositToVault {
            identifier: vault.identifier.clone(),
        };
        self.assemble(self.builder.build(&request, &accounts).await?)
            .await
    }

    /// Transfer instructions from `from` into the vault account. When `from`
    /// is the owner's missing associated account, its creation (and for
    /// wrapped SOL, its funding) comes first.
    async fn fund_instructions(
        &self,
        from: &Pubkey,
        vault: &VaultDescriptor,
        amount: u64,
    ) -> Result<InstructionSet> {
        let owner = self.owner();
        let source = self.rpc.get_account(from).await?;
        let token_program = source.as_ref().map_or(TOKEN_PROGRAM, |a| a.owner);

        let mut instructions: Vec<Instruction> = Vec::with_capacity(4);
        if source.is_none() {
            let owner_ata = associated_token_address(&owner, &vault.token_address, &token_program);
            if *from != owner_ata {
                return Err(Error::NoAccountFound(*from));
            }
            debug!("source account {from} missing, creating it before the transfer");
            instructions.push(create_associated_token_account(
                &owner,
                &owner,
                &vault.token_address,
                &token_program,
            ));
            if vault.token_address == NATIVE_MINT {
                instructions.extend(wrap_sol(&owner, from, amount)?);
            }
        }

        instructions.push(transfer_checked(
            &token_program,
            from,
            &vault.token_address,
            &vault.account_address,
            &owner,
            amount,
            vault.token_decimals,
        )?);
        Ok(InstructionSet::new(instructions))
    }

    /// Transfer `amount` base units from `from` into the vault.
    pub async fn fund_tx(
        &self,
        from: &Pubkey,
        vault: &VaultDescriptor,
        amount: u64,
    ) -> Result<AssembledTransaction> {
        self.assemble(self.fund_instructions(from, vault, amount).await?)
            .await
    }

    pub async fn fund(
        &self,
        from: &Pubkey,
        vault: &VaultDescriptor,
        amount: f64,
    ) -> Result<TxSuccess, VaultError> {
        let _guard = self.locks.acquire(&vault.identifier).await;
        info!("funding vault {} with {amount}", vault.identifier);
        Self::degrade("fund", async {
            let amount = to_base_units(amount, vault.token_decimals)?;
            self.send(self.fund_tx(from, vault, amount).await?).await
        }
        .await)
    }

    pub async fn fund_and_provide_liquidity_with_diff_balance_tx(
        &self,
        vault: &VaultDescriptor,
        user_token_account: &Pubkey,
    ) -> Result<AssembledTransaction> {
        let fund = self
            .fund_with_diff_balance_tx(vault, user_token_account)
            .await?;
        let liquidity = self.provide_liquidity_with_diff_balance_tx(vault).await?;
        self.merge(vec![fund.into(), liquidity.into()]).await
    }

    /// Fund and move the same amount into the yield vault atomically.
    pub async fn fund_and_provide_liquidity_tx(
        &self,
        from: &Pubkey,
        vault: &VaultDescriptor,
        amount: u64,
    ) -> Result<AssembledTransaction> {
        let fund = self.fund_tx(from, vault, amount).await?;
        let liquidity = self.provide_liquidity_tx(vault, amount).await?;
        self.merge(vec![fund.into(), liquidity.into()]).await
    }

    pub async fn fund_and_provide_liquidity(
        &self,
        from: &Pubkey,
        vault: &VaultDescriptor,
        amount: f64,
    ) -> Result<TxSuccess, VaultError> {
        let _guard = self.locks.acquire(&vault.identifier).await;
        info!(
            "funding vault {} with {amount} and providing liquidity",
            vault.identifier
        );
        Self::degrade("fund and provide liquidity", async {
            let amount = to_base_units(amount, vault.token_decimals)?;
            self.send(self.fund_and_provide_liquidity_tx(from, vault, amount).await?)
                .await
        }
        .await)
    }

    async fn withdraw_instructions(
        &self,
        to: &Pubkey,
        vault: &VaultDescriptor,
        amount: u64,
    ) -> Result<InstructionSet> {
        let accounts = self
            .vault_accounts(&vault.identifier, &vault.token_address)?
            .with(AccountRole::UserTokenAccount, *to);
        let request = CapabilityRequest::WithdrawFromVault {
            identifier: vault.identifier.clone(),
            amount,
        };
        self.builder.build(&request, &accounts).await
    }

    /// Withdraw `amount` base units of the vault's token into `to`.
    pub async fn withdraw_tx(
        &self,
        to: &Pubkey,
        vault: &VaultDescriptor,
        amount: u64,
    ) -> Result<AssembledTransaction> {
        self.assemble(self.withdraw_instructions(to, vault, amount).await?)
            .await
    }

    pub async fn withdraw(
        &self,
        to: &Pubkey,
        vault: &VaultDescriptor,
        amount: f64,
    ) -> Result<TxSuccess, VaultError> {
        let _guard = self.locks.acquire(&vault.identifier).await;
        Self::degrade("withdraw", async {
            let amount = to_base_units(amount, vault.token_decimals)?;
            self.send(self.withdraw_tx(to, vault, amount).await?).await
        }
        .await)
    }

    /// Redeem `lp_amount` LP tokens and withdraw `amount` (UI units) to `to`
    /// in one transaction. `main`'s associated account is created first when
    /// missing, and pre-funded with `amount` SOL for the native mint.
    pub async fn withdraw_liquidity_and_withdraw(
        &self,
        main: &Pubkey,
        to: &Pubkey,
        vault: &VaultDescriptor,
        lp_amount: u64,
        amount: f64,
    ) -> Result<TxSuccess, VaultError> {
        let _guard = self.locks.acquire(&vault.identifier).await;
        info!(
            "withdrawing {amount} from vault {} with {lp_amount} LP tokens",
            vault.identifier
        );
        Self::degrade("withdraw liquidity and withdraw", async {
            let owner = self.owner();
            let base_amount = to_base_units(amount, vault.token_decimals)?;
            let main_ata = associated_token_address(main, &vault.token_address, &TOKEN_PROGRAM);

            let mut fragments: Vec<Fragment> = Vec::with_capacity(3);
            if self.rpc.get_account(&main_ata).await?.is_none() {
                let mut prefund = vec![create_associated_token_account(
                    &owner,
                    main,
                    &vault.token_address,
                    &TOKEN_PROGRAM,
                )];
                if vault.token_address == NATIVE_MINT {
                    prefund.extend(wrap_sol(&owner, &main_ata, sol_to_lamports(amount)?)?);
                }
                fragments.push(InstructionSet::new(prefund).into());
            }
            fragments.push(self.withdraw_liquidity_tx(vault, lp_amount).await?.into());
            fragments.push(
                self.withdraw_instructions(to, vault, base_amount)
                    .await?
                    .into(),
            );

            self.send(self.merge(fragments).await?).await
        }
        .await)
    }

    /// Update the vault and move its whole token balance into the yield
    /// vault.
    pub async fn update_vault_and_move_all_to_liquidity(
        &self,
        vault: &VaultDescriptor,
        update: &VaultUpdate,
    ) -> Result<TxSuccess, VaultError> {
        let _guard = self.locks.acquire(&vault.identifier).await;
        Self::degrade("update vault and move all to liquidity", async {
            let update_tx = self.update_vault_tx(vault, update).await?;
            let balance = self.token_amount(&vault.account_address).await?;
            debug!("moving {balance} of vault {} to liquidity", vault.identifier);
            let liquidity_tx = self.provide_liquidity_tx(vault, balance).await?;
            self.send(self.merge(vec![update_tx.into(), liquidity_tx.into()]).await?)
                .await
        }
        .await)
    }

    /// Redeem the vault's whole LP position, then update the vault.
    pub async fn update_vault_and_withdraw_all_from_liquidity(
        &self,
        vault: &VaultDescriptor,
        update: &VaultUpdate,
    ) -> Result<TxSuccess, VaultError> {
        let _guard = self.locks.acquire(&vault.identifier).await;
        Self::degrade("update vault and withdraw all from liquidity", async {
            let info = self
                .yield_protocol
                .vault_info(&vault.token_address)
                .await?
                .ok_or(Error::ProvideLiquidity(vault.token_address))?;
            let lp_owner = self
                .addresses
                .vault_account_owner(vault.identifier_bytes())?;
            let user_lp = self
                .yield_protocol
                .user_lp_address(&info.lp_mint_address()?, &lp_owner);
            let lp_amount = self.token_amount(&user_lp).await?;
            debug!("redeeming {lp_amount} LP tokens of vault {}", vault.identifier);

            let withdraw_tx = self.withdraw_liquidity_tx(vault, lp_amount).await?;
            let update_tx = self.update_vault_tx(vault, update).await?;
            self.send(self.merge(vec![withdraw_tx.into(), update_tx.into()]).await?)
                .await
        }
        .await)
    }

    /// Every vault of the owner with balances, token metadata and earnings.
    /// Failures are logged and yield an empty list.
    pub async fn load_vaults(&self) -> Vec<VaultDescriptor> {
        match self.try_load_vaults().await {
            Ok(vaults) => vaults,
            Err(e) => {
                error!("loading vaults of {} failed: {e}", self.owner());
                Vec::new()
            }
        }
    }

    async fn try_load_vaults(&self) -> Result<Vec<VaultDescriptor>> {
        let data_account = self.addresses.data_account()?;
        let Some(account) = self.rpc.get_account(&data_account).await? else {
            debug!("no vault data account for {}", self.owner());
            return Ok(Vec::new());
        };
        let manager = VaultManagerAccount::load(&account.data)
            .map_err(|e| Error::Deserialization(format!("vault data account: {e}").into()))?;
        let mut vaults: Vec<VaultDescriptor> =
            manager.active_records().map(|r| r.to_descriptor()).collect();
        if vaults.is_empty() {
            return Ok(vaults);
        }

        let mut mints: Vec<Pubkey> = Vec::new();
        for vault in &vaults {
            if !mints.contains(&vault.token_address) {
                mints.push(vault.token_address);
            }
        }
        let addresses: Vec<Pubkey> = vaults
            .iter()
            .map(|v| v.account_address)
            .chain(mints.iter().copied())
            .collect();

        let (accounts, infos) = tokio::try_join!(
            self.rpc.get_multiple_accounts(&addresses),
            try_join_all(mints.iter().map(|mint| self.yield_protocol.vault_info(mint))),
        )?;
        let (vault_accounts, mint_accounts) = accounts.split_at(vaults.len().min(accounts.len()));
        let infos: HashMap<Pubkey, VaultInfo> = mints
            .iter()
            .zip(infos)
            .filter_map(|(mint, info)| info.map(|i| (*mint, i)))
            .collect();

        for (i, vault) in vaults.iter_mut().enumerate() {
            let metadata = self.tokens.iter().find(|t| t.address == vault.token_address);
            let mint_account = mints
                .iter()
                .position(|m| *m == vault.token_address)
                .and_then(|p| mint_accounts.get(p))
                .and_then(Option::as_ref);
            vault.token_decimals = match (mint_account, metadata) {
                (Some(mint), _) => decode_mint_decimals(&vault.token_address, mint)?,
                (None, Some(metadata)) => metadata.decimals,
                (None, None) => return Err(Error::NoAccountFound(vault.token_address)),
            };
            vault.symbol = metadata.map(|m| m.symbol.clone());
            vault.logo_uri = metadata.and_then(|m| m.logo_uri.clone());

            let raw_balance = match vault_accounts.get(i).and_then(Option::as_ref) {
                Some(account) => decode_token_account(&vault.account_address, account)?.amount,
                None => 0,
            };
            vault.balance =
                round_to_n_decimals(from_base_units(raw_balance, vault.token_decimals)?, 2);
        }

        let infos = &infos;
        let earnings = join_all(vaults.iter().map(|vault| async move {
            let info = infos.get(&vault.token_address);
            if vault.earnings_enabled {
                self.earnings_of(vault, info).await.ok()
            } else {
                info.and_then(|info| idle_earnings(info).ok())
            }
        }))
        .await;

        for (vault, earnings) in vaults.iter_mut().zip(earnings) {
            if vault.earnings_enabled {
                vault.balance = earnings.as_ref().map_or(0.0, |e| e.amount_in_tokens);
            }
            vault.earnings = earnings;
        }

        debug!("loaded {} vaults of {}", vaults.len(), self.owner());
        Ok(vaults)
    }

    async fn earnings_of(
        &self,
        vault: &VaultDescriptor,
        info: Option<&VaultInfo>,
    ) -> Result<VaultEarningsData, EarningsError> {
        let lp_owner = self
            .addresses
            .vault_account_owner(vault.identifier_bytes())
            .map_err(|e| {
                warn!("vault {} has an invalid identifier: {e}", vault.identifier);
                EarningsError::unknown()
            })?;
        self.yield_protocol.earnings(info, &lp_owner).await
    }

    /// Current value of the vault's LP position.
    pub async fn get_investments_data(
        &self,
        vault: &VaultDescriptor,
    ) -> Result<VaultEarningsData, EarningsError> {
        let info = self
            .yield_protocol
            .vault_info(&vault.token_address)
            .await
            .map_err(|e| {
                warn!("vault info for {} failed: {e}", vault.token_address);
                EarningsError::unknown()
            })?;
        self.earnings_of(vault, info.as_ref()).await
    }

    pub async fn get_token_apy(&self, token: &Pubkey) -> Option<f64> {
        match self.yield_protocol.vault_info(token).await {
            Ok(info) => info.map(|i| i.average_apy),
            Err(e) => {
                warn!("vault info for {token} failed: {e}");
                None
            }
        }
    }

    /// Fresh UI balance: the LP position's value for earning vaults, the
    /// vault account's balance truncated to cents otherwise.
    pub async fn get_updated_balance(&self, vault: &VaultDescriptor) -> Option<f64> {
        if vault.earnings_enabled {
            return self
                .get_investments_data(vault)
                .await
                .ok()
                .map(|e| e.amount_in_tokens);
        }
        let amount = self
            .token_amount(&vault.account_address)
            .await
            .inspect_err(|e| warn!("balance of vault {} failed: {e}", vault.identifier))
            .ok()?;
        balance_in_cents(amount, vault.token_decimals).ok()
    }

    /// Route `amount` base units of `mint`, held in `token_account`, into the
    /// first vault with a spare level. A different mint is swapped into the
    /// vault's token first. Returns the signed transaction without
    /// submitting it; `None` when there is no such vault or no swap route.
    pub async fn send_token_to_vault_with_spare(
        &self,
        amount: u64,
        mint: &Pubkey,
        decimals: u8,
        token_account: &Pubkey,
    ) -> Result<Option<AssembledTransaction>> {
        info!(
            "routing {} of {mint} from {token_account} to a spare vault",
            from_base_units(amount, decimals)?
        );
        let Some(vault) = self
            .load_vaults()
            .await
            .into_iter()
            .find(|v| v.spare.is_enabled())
        else {
            debug!("no vault with spare enabled");
            return Ok(None);
        };

        if vault.token_address == *mint {
            let transaction = if vault.earnings_enabled {
                self.fund_and_provide_liquidity_tx(token_account, &vault, amount)
                    .await?
            } else {
                self.fund_tx(token_account, &vault, amount).await?
            };
            return Ok(Some(transaction));
        }

        self.swap_into_vault_tx(&vault, amount, mint).await
    }

    async fn swap_into_vault_tx(
        &self,
        vault: &VaultDescriptor,
        amount: u64,
        mint: &Pubkey,
    ) -> Result<Option<AssembledTransaction>> {
        let owner = self.owner();
        let Some(quote) = self
            .swap
            .get_quote(
                mint,
                &vault.token_address,
                amount,
                self.config.swap_slippage_bps,
            )
            .await
        else {
            info!("no swap route {mint} -> {}", vault.token_address);
            return Ok(None);
        };
        let Some(swap) = self.swap.get_swap_instructions(&quote, &owner).await else {
            return Ok(None);
        };
        debug!(
            "swapping into vault {} ({} instructions, {} lookup tables)",
            vault.identifier,
            swap.len(),
            swap.lookup_tables.len()
        );

        let user_ata = associated_token_address(&owner, &vault.token_address, &TOKEN_PROGRAM);
        let mut fragments: Vec<Fragment> = Vec::with_capacity(4);
        if self.rpc.get_account(&user_ata).await?.is_none() {
            fragments.push(
                InstructionSet::from(create_associated_token_account(
                    &owner,
                    &owner,
                    &vault.token_address,
                    &TOKEN_PROGRAM,
                ))
                .into(),
            );
        }
        fragments.push(self.save_on_ledger_tx(vault, &user_ata).await?.into());
        fragments.push(swap.into());
        let deposit = if vault.earnings_enabled {
            self.fund_and_provide_liquidity_with_diff_balance_tx(vault, &user_ata)
                .await?
        } else {
            self.fund_with_diff_balance_tx(vault, &user_ata).await?
        };
        fragments.push(deposit.into());

        Ok(Some(self.merge(fragments).await?))
    }

    /// Submit a transaction built by one of the `*_tx` methods.
    pub async fn submit(&self, transaction: AssembledTransaction) -> Result<TxSuccess, VaultError> {
        Self::degrade("submit", self.send(transaction).await)
    }

    pub async fn wait_for_confirmation(
        &self,
        signature: &Signature,
        anchor: &FreshnessAnchor,
    ) -> Result<ConfirmationStatus, VaultError> {
        Self::degrade(
            "confirmation",
            self.submitter.wait_for_confirmation(signature, anchor).await,
        )
    }
}
