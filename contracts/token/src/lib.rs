#![cfg_attr(not(feature = "std"), no_std, no_main)]

/// # Zchan: ZCH Dividend Token
///
/// **Role:** Platform token of the Zchan forum.  Every unit of native value
/// that reaches this contract through `purchase` or `deposit` is shared
/// pro-rata between current ZCH holders.
///
/// ## Dividend accounting
///
/// Holders are never iterated.  A global accumulator records the cumulative
/// wei paid per token, and each account keeps the accumulator value it last
/// settled at:
///
/// ```text
///   wei_per_token      += amount × SCALE / total_supply        (distribute)
///   dividends_of(a)     = (wei_per_token − snapshot[a]) × balance[a] / SCALE
///                       + coalesced[a]
/// ```
///
/// Before any balance of `a` changes, the unbanked part is moved into
/// `coalesced[a]` and `snapshot[a]` is reset (coalescing).  Otherwise the new
/// balance would be multiplied against accumulator growth it never held
/// tokens for.
///
/// ```text
///   [Forum] ──deposit(DEPOSIT_SELECTOR)──► [ZCH Token] ──withdraw()──► holders
///   [Buyer] ──purchase() payable────────►      │
///   [Holder of exchange token] ──exchange(n)───┘
/// ```
///
/// **Compatibility:** ink! v5.

pub mod constants {
    /// Fixed-point scale of `wei_per_token` (18 decimals).
    pub const SCALE: u128 = 1_000_000_000_000_000_000;

    /// ZCH minted per unit of native value on `purchase`.
    pub const TOKENS_PER_WEI: u128 = 1_000;

    /// Tag the caller of `deposit` must pass.  Equal to the selector of
    /// `deposit` itself.
    pub const DEPOSIT_SELECTOR: [u8; 4] = ink::selector_bytes!("deposit");

    pub const DECIMALS: u8 = 18;
}

#[ink::contract]
pub mod dividend_token {
    use crate::constants::*;
    use ink::env::call::{build_call, ExecutionInput, Selector};
    use ink::env::DefaultEnvironment;
    use ink::prelude::string::String;
    use ink::storage::Mapping;
    use primitive_types::U256;

    // =========================================================================
    // STORAGE
    // =========================================================================

    #[ink(storage)]
    pub struct DividendToken {
        // ── Token metadata ────────────────────────────────────────────────
        name: String,
        symbol: String,
        total_supply: Balance,

        // ── Ledger ────────────────────────────────────────────────────────
        balances: Mapping<AccountId, Balance>,
        allowances: Mapping<(AccountId, AccountId), Balance>,

        // ── Dividend accounting ───────────────────────────────────────────
        /// Cumulative wei distributed per token, scaled by `SCALE`.
        /// Never decreases.
        wei_per_token: Balance,
        /// `wei_per_token` as of the last settlement of each account.
        snapshots: Mapping<AccountId, Balance>,
        /// Settled dividends not yet withdrawn.
        coalesced: Mapping<AccountId, Balance>,

        // ── Exchange socket ───────────────────────────────────────────────
        /// Token accepted 1:1 by `exchange`.
        exchange_token: AccountId,

        owner: AccountId,
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    #[ink(event)]
    pub struct Transfer {
        #[ink(topic)]
        from: Option<AccountId>,
        #[ink(topic)]
        to: Option<AccountId>,
        value: Balance,
    }

    #[ink(event)]
    pub struct Approval {
        #[ink(topic)]
        owner: AccountId,
        #[ink(topic)]
        spender: AccountId,
        value: Balance,
    }

    /// Emitted when a contract forwards proceeds through `deposit`.
    #[ink(event)]
    pub struct FundsDeposited {
        #[ink(topic)]
        from: AccountId,
        amount: Balance,
    }

    #[ink(event)]
    pub struct DividendsWithdrawn {
        #[ink(topic)]
        account: AccountId,
        amount: Balance,
    }

    #[ink(event)]
    pub struct ExchangeTokenUpdated {
        #[ink(topic)]
        token: AccountId,
    }

    // =========================================================================
    // ERRORS
    // =========================================================================

    #[derive(Debug, PartialEq, Eq, scale::Encode, scale::Decode)]
    #[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
    pub enum Error {
        /// Caller is not the contract owner.
        NotOwner,
        /// Sender's ZCH balance is insufficient.
        InsufficientBalance,
        /// Spender's allowance is insufficient.
        InsufficientAllowance,
        /// Caller has no dividends to withdraw.
        InsufficientDividends,
        /// No value or amount was supplied.
        ZeroValue,
        /// `deposit` was called by an account that is not a contract.
        NotContract,
        /// `deposit` was called with the wrong tag.
        InvalidSelector,
        /// Pulling the exchange token failed.
        TokenTransferFailed,
        /// Querying the exchange token failed.
        TokenQueryFailed,
        /// A native value transfer failed.
        TransferFailed,
        /// An arithmetic operation overflowed.
        Overflow,
    }

    // =========================================================================
    // IMPLEMENTATION
    // =========================================================================

    impl DividendToken {
        #[ink(constructor)]
        pub fn new(exchange_token: AccountId) -> Self {
            Self {
                name: String::from("Zchan"),
                symbol: String::from("ZCH"),
                total_supply: 0,
                balances: Mapping::default(),
                allowances: Mapping::default(),
                wei_per_token: 0,
                snapshots: Mapping::default(),
                coalesced: Mapping::default(),
                exchange_token,
                owner: Self::env().caller(),
            }
        }

        // =====================================================================
        // FUNDING: Purchase, Deposit, Exchange
        // =====================================================================

        /// Buy ZCH with native value at `TOKENS_PER_WEI`.
        ///
        /// The attached value is distributed to existing holders first, with
        /// the purchaser excluded from their own contribution.  With no
        /// supply yet, the value is not credited to anyone.
        #[ink(message, payable)]
        pub fn purchase(&mut self) -> Result<Balance, Error> {
            let caller = self.env().caller();
            let value = self.env().transferred_value();
            if value == 0 {
                return Err(Error::ZeroValue);
            }

            let minted = value.checked_mul(TOKENS_PER_WEI).ok_or(Error::Overflow)?;
            self.distribute(value, Some(caller))?;
            self.mint(caller, minted)?;
            Ok(minted)
        }

        /// Entry point for contracts forwarding proceeds to ZCH holders.
        ///
        /// `selector` must equal [`DEPOSIT_SELECTOR`].
        #[ink(message, payable)]
        pub fn deposit(&mut self, selector: [u8; 4]) -> Result<(), Error> {
            let from = self.env().caller();
            if !self.env().is_contract(&from) {
                return Err(Error::NotContract);
            }
            if selector != DEPOSIT_SELECTOR {
                return Err(Error::InvalidSelector);
            }

            let amount = self.env().transferred_value();
            self.distribute(amount, None)?;
            self.env().emit_event(FundsDeposited { from, amount });
            Ok(())
        }

        /// Swap `amount` of the exchange token for the same amount of ZCH.
        ///
        /// The caller must have approved this contract on the exchange token.
        #[ink(message)]
        pub fn exchange(&mut self, amount: Balance) -> Result<(), Error> {
            let caller = self.env().caller();
            self.exchange_impl(caller, amount)
        }

        /// Swap the caller's whole exchange-token allowance to this contract.
        #[ink(message)]
        pub fn exchange_all(&mut self) -> Result<Balance, Error> {
            let caller = self.env().caller();
            let amount = self.query_exchange_allowance(caller)?;
            self.exchange_impl(caller, amount)?;
            Ok(amount)
        }

        /// Withdraw all settled and unsettled dividends of the caller.
        ///
        /// State is reset before the transfer (checks-effects-interactions).
        #[ink(message)]
        pub fn withdraw(&mut self) -> Result<Balance, Error> {
            let caller = self.env().caller();
            let amount = self.owed_dividends(caller)?;
            if amount == 0 {
                return Err(Error::InsufficientDividends);
            }

            self.snapshots.insert(caller, &self.wei_per_token);
            self.coalesced.remove(caller);

            self.env()
                .transfer(caller, amount)
                .map_err(|_| Error::TransferFailed)?;

            self.env().emit_event(DividendsWithdrawn {
                account: caller,
                amount,
            });
            Ok(amount)
        }

        /// Withdrawable dividends of `account`.  Saturates where `withdraw`
        /// would fail with `Overflow`.
        #[ink(message)]
        pub fn dividends_of(&self, account: AccountId) -> Balance {
            self.owed_dividends(account).unwrap_or(Balance::MAX)
        }

        // =====================================================================
        // PSP22: Standard Token Interface
        // =====================================================================

        #[ink(message)]
        pub fn total_supply(&self) -> Balance {
            self.total_supply
        }

        #[ink(message)]
        pub fn balance_of(&self, account: AccountId) -> Balance {
            self.balances.get(account).unwrap_or(0)
        }

        #[ink(message)]
        pub fn allowance(&self, owner: AccountId, spender: AccountId) -> Balance {
            self.allowances.get((owner, spender)).unwrap_or(0)
        }

        #[ink(message)]
        pub fn approve(&mut self, spender: AccountId, value: Balance) -> Result<(), Error> {
            let owner = self.env().caller();
            self.allowances.insert((owner, spender), &value);
            self.env().emit_event(Approval { owner, spender, value });
            Ok(())
        }

        #[ink(message)]
        pub fn transfer(&mut self, to: AccountId, value: Balance) -> Result<(), Error> {
            let from = self.env().caller();
            self.transfer_impl(from, to, value)
        }

        #[ink(message)]
        pub fn transfer_from(
            &mut self,
            from: AccountId,
            to: AccountId,
            value: Balance,
        ) -> Result<(), Error> {
            let caller = self.env().caller();
            let current_allowance = self.allowance(from, caller);
            if current_allowance < value {
                return Err(Error::InsufficientAllowance);
            }
            if self.balance_of(from) < value {
                return Err(Error::InsufficientBalance);
            }
            self.allowances
                .insert((from, caller), &current_allowance.saturating_sub(value));
            self.transfer_impl(from, to, value)
        }

        /// Destroy `value` of the caller's ZCH.  Dividends earned up to now
        /// stay withdrawable.
        #[ink(message)]
        pub fn burn(&mut self, value: Balance) -> Result<(), Error> {
            let from = self.env().caller();
            if self.balance_of(from) < value {
                return Err(Error::InsufficientBalance);
            }

            self.coalesce(from)?;
            self.debit_balance(from, value)?;
            self.total_supply = self.total_supply.saturating_sub(value);

            self.env().emit_event(Transfer {
                from: Some(from),
                to: None,
                value,
            });
            Ok(())
        }

        // =====================================================================
        // VIEW FUNCTIONS
        // =====================================================================

        #[ink(message)]
        pub fn name(&self) -> String {
            self.name.clone()
        }

        #[ink(message)]
        pub fn symbol(&self) -> String {
            self.symbol.clone()
        }

        #[ink(message)]
        pub fn decimals(&self) -> u8 {
            DECIMALS
        }

        #[ink(message)]
        pub fn wei_per_token(&self) -> Balance {
            self.wei_per_token
        }

        #[ink(message)]
        pub fn snapshot_of(&self, account: AccountId) -> Balance {
            self.snapshots.get(account).unwrap_or(0)
        }

        #[ink(message)]
        pub fn coalesced_dividends_of(&self, account: AccountId) -> Balance {
            self.coalesced.get(account).unwrap_or(0)
        }

        #[ink(message)]
        pub fn get_exchange_token(&self) -> AccountId {
            self.exchange_token
        }

        // =====================================================================
        // ADMIN
        // =====================================================================

        #[ink(message)]
        pub fn set_exchange_token(&mut self, token: AccountId) -> Result<(), Error> {
            self.only_owner()?;
            self.exchange_token = token;
            self.env().emit_event(ExchangeTokenUpdated { token });
            Ok(())
        }

        // =====================================================================
        // INTERNAL: Dividend accounting
        // =====================================================================

        /// Spread `amount` over the current supply.
        ///
        /// `excluded` has its snapshot advanced by the same increment, so its
        /// existing balance earns nothing from this distribution.
        fn distribute(&mut self, amount: Balance, excluded: Option<AccountId>) -> Result<(), Error> {
            // No holders: the amount stays in the contract uncredited.
            if self.total_supply == 0 || amount == 0 {
                return Ok(());
            }

            let increment = to_balance(mul_div(amount, SCALE, self.total_supply)?)?;
            self.wei_per_token = self
                .wei_per_token
                .checked_add(increment)
                .ok_or(Error::Overflow)?;

            if let Some(account) = excluded {
                let snapshot = self
                    .snapshot_of(account)
                    .checked_add(increment)
                    .ok_or(Error::Overflow)?;
                self.snapshots.insert(account, &snapshot);
            }
            Ok(())
        }

        /// Bank the unsettled dividends of `account` and reset its snapshot.
        /// Must run before every balance change of `account`.
        fn coalesce(&mut self, account: AccountId) -> Result<(), Error> {
            let unbanked = self.unbanked_dividends(account)?;
            if unbanked > 0 {
                let banked = self
                    .coalesced_dividends_of(account)
                    .checked_add(unbanked)
                    .ok_or(Error::Overflow)?;
                self.coalesced.insert(account, &banked);
            }
            self.snapshots.insert(account, &self.wei_per_token);
            Ok(())
        }

        fn unbanked_dividends(&self, account: AccountId) -> Result<Balance, Error> {
            let delta = self.wei_per_token.saturating_sub(self.snapshot_of(account));
            let balance = self.balance_of(account);
            if delta == 0 || balance == 0 {
                return Ok(0);
            }
            to_balance(mul_div(delta, balance, SCALE)?)
        }

        fn owed_dividends(&self, account: AccountId) -> Result<Balance, Error> {
            self.unbanked_dividends(account)?
                .checked_add(self.coalesced_dividends_of(account))
                .ok_or(Error::Overflow)
        }

        // =====================================================================
        // INTERNAL: Ledger
        // =====================================================================

        fn mint(&mut self, to: AccountId, value: Balance) -> Result<(), Error> {
            self.coalesce(to)?;
            self.total_supply = self.total_supply.checked_add(value).ok_or(Error::Overflow)?;
            self.credit_balance(to, value)?;
            self.env().emit_event(Transfer {
                from: None,
                to: Some(to),
                value,
            });
            Ok(())
        }

        fn transfer_impl(&mut self, from: AccountId, to: AccountId, value: Balance) -> Result<(), Error> {
            if self.balance_of(from) < value {
                return Err(Error::InsufficientBalance);
            }

            self.coalesce(from)?;
            self.coalesce(to)?;
            self.debit_balance(from, value)?;
            self.credit_balance(to, value)?;

            self.env().emit_event(Transfer {
                from: Some(from),
                to: Some(to),
                value,
            });
            Ok(())
        }

        fn exchange_impl(&mut self, caller: AccountId, amount: Balance) -> Result<(), Error> {
            if amount == 0 {
                return Err(Error::ZeroValue);
            }
            // Reverted together with the call if the pull below fails.
            self.mint(caller, amount)?;
            self.pull_exchange_tokens(caller, amount)
        }

        fn debit_balance(&mut self, account: AccountId, amount: Balance) -> Result<(), Error> {
            let balance = self.balance_of(account);
            if balance < amount {
                return Err(Error::InsufficientBalance);
            }
            self.balances.insert(account, &balance.saturating_sub(amount));
            Ok(())
        }

        fn credit_balance(&mut self, account: AccountId, amount: Balance) -> Result<(), Error> {
            let balance = self.balance_of(account);
            let new_balance = balance.checked_add(amount).ok_or(Error::Overflow)?;
            self.balances.insert(account, &new_balance);
            Ok(())
        }

        fn only_owner(&self) -> Result<(), Error> {
            if self.env().caller() != self.owner {
                return Err(Error::NotOwner);
            }
            Ok(())
        }

        // =====================================================================
        // INTERNAL: Cross-Contract Calls
        // =====================================================================

        fn pull_exchange_tokens(&self, from: AccountId, amount: Balance) -> Result<(), Error> {
            let result = build_call::<DefaultEnvironment>()
                .call(self.exchange_token)
                .exec_input(
                    ExecutionInput::new(Selector::new(ink::selector_bytes!("transfer_from")))
                        .push_arg(from)
                        .push_arg(self.env().account_id())
                        .push_arg(amount),
                )
                .returns::<Result<(), Error>>()
                .try_invoke();

            match result {
                Ok(Ok(Ok(()))) => Ok(()),
                _ => Err(Error::TokenTransferFailed),
            }
        }

        fn query_exchange_allowance(&self, owner: AccountId) -> Result<Balance, Error> {
            let result = build_call::<DefaultEnvironment>()
                .call(self.exchange_token)
                .exec_input(
                    ExecutionInput::new(Selector::new(ink::selector_bytes!("allowance")))
                        .push_arg(owner)
                        .push_arg(self.env().account_id()),
                )
                .returns::<Balance>()
                .try_invoke();

            match result {
                Ok(Ok(allowance)) => Ok(allowance),
                _ => Err(Error::TokenQueryFailed),
            }
        }
    }

    /// `a × b / d` with a 256-bit intermediate.
    fn mul_div(a: Balance, b: Balance, d: Balance) -> Result<U256, Error> {
        U256::from(a)
            .checked_mul(U256::from(b))
            .ok_or(Error::Overflow)?
            .checked_div(U256::from(d))
            .ok_or(Error::Overflow)
    }

    fn to_balance(value: U256) -> Result<Balance, Error> {
        if value > U256::from(Balance::MAX) {
            return Err(Error::Overflow);
        }
        Ok(value.low_u128())
    }

    // =========================================================================
    // UNIT TESTS
    // =========================================================================

    #[cfg(test)]
    mod tests {
        use super::*;
        use ink::env::{test, DefaultEnvironment};

        type Env = DefaultEnvironment;

        /// Off-chain balances below the existential deposit are rejected.
        const SEED: Balance = 1_000_000;

        fn accounts() -> test::DefaultAccounts<Env> {
            test::default_accounts::<Env>()
        }

        fn set_caller(a: AccountId) {
            test::set_caller::<Env>(a);
        }

        fn contract_id() -> AccountId {
            AccountId::from([0x42; 32])
        }

        fn native_balance(a: AccountId) -> Balance {
            test::get_account_balance::<Env>(a).unwrap_or(0)
        }

        /// Attach `value` to the next call and credit it to the contract.
        fn attach(value: Balance) {
            test::set_value_transferred::<Env>(value);
            let held = native_balance(contract_id());
            test::set_account_balance::<Env>(contract_id(), held + value);
        }

        fn deploy() -> DividendToken {
            test::set_callee::<Env>(contract_id());
            test::set_account_balance::<Env>(contract_id(), SEED);
            set_caller(accounts().alice);
            DividendToken::new(accounts().frank)
        }

        /// Decode the most recently emitted event as `E`.
        fn last_event<E: scale::Decode>() -> E {
            let event = test::recorded_events().last().expect("no event emitted");
            E::decode(&mut &event.data[..]).expect("undecodable event")
        }

        fn purchase_as(t: &mut DividendToken, who: AccountId, value: Balance) {
            set_caller(who);
            attach(value);
            t.purchase().unwrap();
            test::set_value_transferred::<Env>(0);
        }

        fn deposit_from(t: &mut DividendToken, forum: AccountId, value: Balance) {
            test::set_contract::<Env>(forum);
            set_caller(forum);
            attach(value);
            t.deposit(DEPOSIT_SELECTOR).unwrap();
            test::set_value_transferred::<Env>(0);
        }

        // ── Purchase ───────────────────────────────────────────────────────────

        #[ink::test]
        fn purchase_mints_tokens_per_wei() {
            let mut t = deploy();
            purchase_as(&mut t, accounts().alice, 100);
            assert_eq!(t.balance_of(accounts().alice), 100 * TOKENS_PER_WEI);
            assert_eq!(t.total_supply(), 100 * TOKENS_PER_WEI);
        }

        #[ink::test]
        fn purchase_without_value_rejected() {
            let mut t = deploy();
            set_caller(accounts().alice);
            test::set_value_transferred::<Env>(0);
            assert_eq!(t.purchase(), Err(Error::ZeroValue));
        }

        #[ink::test]
        fn first_purchase_with_no_supply_credits_nobody() {
            let mut t = deploy();
            purchase_as(&mut t, accounts().alice, 100);
            assert_eq!(t.wei_per_token(), 0);
            assert_eq!(t.dividends_of(accounts().alice), 0);
        }

        #[ink::test]
        fn purchase_pays_existing_holders_not_purchaser() {
            let mut t = deploy();
            let accs = accounts();
            purchase_as(&mut t, accs.alice, 100);
            purchase_as(&mut t, accs.bob, 100);
            // 100 wei over 100 000 ZCH, all held by alice.
            assert_eq!(t.dividends_of(accs.alice), 100);
            assert_eq!(t.dividends_of(accs.bob), 0);
        }

        #[ink::test]
        fn repeat_purchase_keeps_earlier_dividends() {
            let mut t = deploy();
            let accs = accounts();
            purchase_as(&mut t, accs.alice, 100);
            purchase_as(&mut t, accs.bob, 100);
            purchase_as(&mut t, accs.alice, 200);
            // alice keeps the 100 from bob and gets nothing from her own 200.
            assert_eq!(t.dividends_of(accs.alice), 100);
            // bob held half the supply during alice's 200.
            assert_eq!(t.dividends_of(accs.bob), 100);
        }

        // ── Deposit ────────────────────────────────────────────────────────────

        #[ink::test]
        fn deposit_splits_pro_rata() {
            let mut t = deploy();
            let accs = accounts();
            purchase_as(&mut t, accs.alice, 300);
            t.transfer(accs.bob, 100 * TOKENS_PER_WEI).unwrap();
            deposit_from(&mut t, accs.charlie, 900);
            assert_eq!(t.dividends_of(accs.alice), 600);
            assert_eq!(t.dividends_of(accs.bob), 300);
        }

        #[ink::test]
        fn deposit_rejects_plain_accounts() {
            let mut t = deploy();
            set_caller(accounts().django);
            test::set_value_transferred::<Env>(10);
            assert_eq!(t.deposit(DEPOSIT_SELECTOR), Err(Error::NotContract));
        }

        #[ink::test]
        fn deposit_rejects_wrong_selector() {
            let mut t = deploy();
            let forum = accounts().charlie;
            test::set_contract::<Env>(forum);
            set_caller(forum);
            test::set_value_transferred::<Env>(10);
            assert_eq!(t.deposit([0xde, 0xad, 0xbe, 0xef]), Err(Error::InvalidSelector));
        }

        #[ink::test]
        fn deposit_emits_event() {
            let mut t = deploy();
            purchase_as(&mut t, accounts().alice, 10);
            let before = test::recorded_events().count();
            deposit_from(&mut t, accounts().charlie, 50);
            assert_eq!(test::recorded_events().count(), before + 1);

            let event: FundsDeposited = last_event();
            assert_eq!(event.from, accounts().charlie);
            assert_eq!(event.amount, 50);
        }

        // ── Coalescing ─────────────────────────────────────────────────────────

        #[ink::test]
        fn transfer_keeps_earned_dividends_with_sender() {
            let mut t = deploy();
            let accs = accounts();
            purchase_as(&mut t, accs.alice, 100);
            purchase_as(&mut t, accs.bob, 100);
            set_caller(accs.alice);
            t.transfer(accs.django, 100 * TOKENS_PER_WEI).unwrap();

            assert_eq!(t.dividends_of(accs.alice), 100);
            assert_eq!(t.coalesced_dividends_of(accs.alice), 100);
            assert_eq!(t.dividends_of(accs.django), 0);

            deposit_from(&mut t, accs.charlie, 1_000);
            assert_eq!(t.dividends_of(accs.alice), 100, "alice no longer holds");
            assert_eq!(t.dividends_of(accs.django), 500);
            assert_eq!(t.dividends_of(accs.bob), 500);
        }

        #[ink::test]
        fn burn_keeps_earned_dividends() {
            let mut t = deploy();
            let accs = accounts();
            purchase_as(&mut t, accs.alice, 100);
            purchase_as(&mut t, accs.bob, 100);
            set_caller(accs.alice);
            t.burn(100 * TOKENS_PER_WEI).unwrap();
            assert_eq!(t.balance_of(accs.alice), 0);
            assert_eq!(t.total_supply(), 100 * TOKENS_PER_WEI);
            assert_eq!(t.dividends_of(accs.alice), 100);
        }

        #[ink::test]
        fn burn_above_balance_rejected() {
            let mut t = deploy();
            purchase_as(&mut t, accounts().alice, 1);
            set_caller(accounts().alice);
            assert_eq!(t.burn(TOKENS_PER_WEI + 1), Err(Error::InsufficientBalance));
        }

        #[ink::test]
        fn transfer_from_consumes_allowance() {
            let mut t = deploy();
            let accs = accounts();
            purchase_as(&mut t, accs.alice, 10);
            set_caller(accs.alice);
            t.approve(accs.bob, 4_000).unwrap();
            set_caller(accs.bob);
            t.transfer_from(accs.alice, accs.eve, 3_000).unwrap();
            assert_eq!(t.balance_of(accs.eve), 3_000);
            assert_eq!(t.allowance(accs.alice, accs.bob), 1_000);
            assert_eq!(
                t.transfer_from(accs.alice, accs.eve, 3_000),
                Err(Error::InsufficientAllowance)
            );
        }

        // ── Withdraw ───────────────────────────────────────────────────────────

        #[ink::test]
        fn withdraw_pays_out_and_resets() {
            let mut t = deploy();
            let accs = accounts();
            purchase_as(&mut t, accs.alice, 100);
            purchase_as(&mut t, accs.bob, 100);

            let before = native_balance(accs.alice);
            set_caller(accs.alice);
            assert_eq!(t.withdraw(), Ok(100));
            assert_eq!(native_balance(accs.alice), before + 100);
            assert_eq!(t.dividends_of(accs.alice), 0);
            assert_eq!(t.snapshot_of(accs.alice), t.wei_per_token());
            assert_eq!(t.withdraw(), Err(Error::InsufficientDividends));

            let event: DividendsWithdrawn = last_event();
            assert_eq!(event.account, accs.alice);
            assert_eq!(event.amount, 100);
        }

        #[ink::test]
        fn oversized_unbanked_dividends_fail_instead_of_saturating() {
            let mut t = deploy();
            let accs = accounts();
            t.wei_per_token = Balance::MAX;
            t.balances.insert(accs.alice, &Balance::MAX);
            t.total_supply = Balance::MAX;

            assert_eq!(t.dividends_of(accs.alice), Balance::MAX);
            set_caller(accs.alice);
            assert_eq!(t.transfer(accs.bob, 1), Err(Error::Overflow));
            assert_eq!(t.withdraw(), Err(Error::Overflow));
            assert_eq!(t.coalesced_dividends_of(accs.alice), 0);
        }

        #[ink::test]
        fn withdraw_includes_coalesced_bucket() {
            let mut t = deploy();
            let accs = accounts();
            purchase_as(&mut t, accs.alice, 100);
            purchase_as(&mut t, accs.bob, 100);
            set_caller(accs.alice);
            t.transfer(accs.bob, 50 * TOKENS_PER_WEI).unwrap();
            deposit_from(&mut t, accs.charlie, 400);
            // 100 banked + 50 000 / 200 000 of 400.
            set_caller(accs.alice);
            assert_eq!(t.withdraw(), Ok(200));
            assert_eq!(t.coalesced_dividends_of(accs.alice), 0);
        }

        // ── Conservation ───────────────────────────────────────────────────────

        #[ink::test]
        fn dividends_conserved_across_operations() {
            let mut t = deploy();
            let accs = accounts();
            let forum = accs.charlie;
            let holders = [accs.alice, accs.bob, accs.django, accs.eve];

            purchase_as(&mut t, accs.alice, 1_000); // uncredited: no supply yet
            purchase_as(&mut t, accs.bob, 500);
            deposit_from(&mut t, forum, 7_000);
            set_caller(accs.bob);
            t.transfer(accs.django, 123_456).unwrap();
            set_caller(accs.alice);
            let withdrawn = t.withdraw().unwrap();
            purchase_as(&mut t, accs.eve, 250);
            deposit_from(&mut t, forum, 3_333);
            set_caller(accs.django);
            t.burn(23_456).unwrap();
            deposit_from(&mut t, forum, 1_111);

            // bob's 500 paid alice; eve's 250 paid the other holders.
            let distributed: Balance = 500 + 7_000 + 250 + 3_333 + 1_111;
            let owed: Balance = holders.iter().map(|a| t.dividends_of(*a)).sum();
            let accounted = owed + withdrawn;
            assert!(accounted <= distributed);
            assert!(
                distributed - accounted <= 10,
                "rounding loss must stay within a few wei, lost {}",
                distributed - accounted
            );
        }

        #[ink::test]
        fn wei_per_token_never_decreases() {
            let mut t = deploy();
            let accs = accounts();
            purchase_as(&mut t, accs.alice, 10);
            let mut last = t.wei_per_token();
            for value in [5u128, 0, 17, 1] {
                if value > 0 {
                    purchase_as(&mut t, accs.bob, value);
                }
                assert!(t.wei_per_token() >= last);
                last = t.wei_per_token();
            }
        }

        // ── Exchange / admin ───────────────────────────────────────────────────

        #[ink::test]
        fn exchange_zero_rejected() {
            let mut t = deploy();
            set_caller(accounts().alice);
            assert_eq!(t.exchange(0), Err(Error::ZeroValue));
        }

        #[ink::test]
        fn set_exchange_token_only_owner() {
            let mut t = deploy();
            set_caller(accounts().bob);
            assert_eq!(t.set_exchange_token(accounts().eve), Err(Error::NotOwner));
            set_caller(accounts().alice);
            t.set_exchange_token(accounts().eve).unwrap();
            assert_eq!(t.get_exchange_token(), accounts().eve);
        }

        #[ink::test]
        fn mul_div_uses_wide_intermediate() {
            let big = Balance::MAX / 2;
            assert_eq!(mul_div(big, SCALE, SCALE), Ok(U256::from(big)));
            assert_eq!(to_balance(U256::from(Balance::MAX) + U256::from(1u8)), Err(Error::Overflow));
        }
    }
}
