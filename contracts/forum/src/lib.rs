#![cfg_attr(not(feature = "std"), no_std, no_main)]

/// # Zchan: Forum Ledger
///
/// **Role:** Boards, threads and posts.  Posting is gated by stake, and both
/// board creation and posting are paid in native value or ZCH.
///
/// ## Purchase protocol
///
/// Every paid message is wrapped in two phases around its ledger writes:
///
/// ```text
///   begin     value > 0  → require value ≥ wei_price
///             value = 0  → require ZCH allowance ≥ token_price
///   mutate    boards / threads / posts / counters / ranking
///   finalize  value > 0  → deposit wei_price into the funds recipient,
///                          refund value − wei_price
///             value = 0  → transfer_from(caller, forum, token_price)
/// ```
///
/// No external call happens before the ledger is final
/// (checks-effects-interactions).
///
/// ## Activity ranking
///
/// Threads of a board form an intrusive doubly-linked list keyed by thread ID,
/// with `0` as NULL and `board_leading_thread` as head.  A post moves its
/// thread to the head in O(1) until the thread holds `BUMP_LIMIT` posts.
///
/// ```text
///   head ─► [T3] ⇄ [T1] ⇄ [T2] ─► NULL      post to T2 (count < 50)
///   head ─► [T2] ⇄ [T3] ⇄ [T1] ─► NULL
/// ```
///
/// **Compatibility:** ink! v5.

pub mod constants {
    /// Thread ID used as the list terminator and as "new thread" on publish.
    pub const NULL_THREAD: u32 = 0;

    /// Post count at which a thread stops being bumped.
    pub const BUMP_LIMIT: u32 = 50;

    /// Length of a board code in bytes.
    pub const BOARD_CODE_LEN: usize = 4;
}

/// A code is a run of `a`-`z` followed only by zero bytes.  All zero is valid.
pub fn validate_board_code(code: &[u8; constants::BOARD_CODE_LEN]) -> bool {
    let letters = code.iter().take_while(|b| b.is_ascii_lowercase()).count();
    code[letters..].iter().all(|b| *b == 0)
}

#[ink::contract]
pub mod forum {
    use crate::constants::*;
    use ink::env::call::{build_call, ExecutionInput, Selector};
    use ink::env::DefaultEnvironment;
    use ink::prelude::vec::Vec;
    use ink::storage::Mapping;
    use zchan_token::constants::DEPOSIT_SELECTOR;
    use zchan_token::dividend_token::Error as TokenError;

    // =========================================================================
    // TYPES
    // =========================================================================

    pub type BoardCode = [u8; BOARD_CODE_LEN];

    #[derive(Debug, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
    #[cfg_attr(feature = "std", derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout))]
    pub struct Board {
        pub creator: AccountId,
        pub code: BoardCode,
        pub content_hash: Hash,
    }

    /// Node of a board's activity list.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, scale::Encode, scale::Decode)]
    #[cfg_attr(feature = "std", derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout))]
    pub struct Thread {
        pub prev_thread_id: u32,
        pub next_thread_id: u32,
        pub post_count: u32,
    }

    /// A zero `img_hash` means the post has no image.
    #[derive(Debug, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
    #[cfg_attr(feature = "std", derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout))]
    pub struct Post {
        pub author: AccountId,
        pub board_id: u32,
        pub thread_id: u32,
        pub txt_hash: Hash,
        pub img_hash: Hash,
    }

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, scale::Encode, scale::Decode)]
    #[cfg_attr(feature = "std", derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout))]
    pub struct UserStats {
        pub post_count: u32,
        pub last_post_timestamp: u64,
    }

    /// Price of one purchase in each currency.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, scale::Encode, scale::Decode)]
    #[cfg_attr(feature = "std", derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout))]
    pub struct Price {
        pub wei: Balance,
        pub token: Balance,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, scale::Encode, scale::Decode)]
    #[cfg_attr(feature = "std", derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout))]
    pub struct StakeThresholds {
        /// Stake granting `TxtOnly`.
        pub post_txt_minimum: Balance,
        /// Stake granting `TxtWithImg`.
        pub post_img_minimum: Balance,
        /// Cap on a single account's stake.
        pub maximum: Balance,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, scale::Encode, scale::Decode)]
    #[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
    pub enum PostingPrivilege {
        None,
        TxtOnly,
        TxtWithImg,
    }

    /// IDs assigned by `publish_post`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, scale::Encode, scale::Decode)]
    #[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
    pub struct PublishedPost {
        pub thread_id: u32,
        pub post_id: u32,
        /// 1-based position of the post within its thread.
        pub ordinal: u32,
    }

    /// Outcome of the begin phase, consumed by the finalize phase.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Payment {
        Native { attached: Balance, price: Balance },
        Token { price: Balance },
    }

    // =========================================================================
    // STORAGE
    // =========================================================================

    #[ink(storage)]
    pub struct Forum {
        owner: AccountId,

        // ── Payment sockets ───────────────────────────────────────────────
        /// Platform token accepted through allowance.
        token: AccountId,
        /// Receives native proceeds through `deposit`.  Proceeds are retained
        /// in this contract while unset.
        funds_recipient: Option<AccountId>,
        /// Native proceeds held back while no recipient was set.  Kept apart
        /// from stake collateral; only `sweep_proceeds` moves them.
        retained_proceeds: Balance,
        board_price: Price,
        post_price: Price,

        // ── Staking ───────────────────────────────────────────────────────
        stake_thresholds: StakeThresholds,
        stakes: Mapping<AccountId, Balance>,

        // ── Boards ────────────────────────────────────────────────────────
        board_count: u32,
        boards: Mapping<u32, Board>,
        /// Claimed codes.  Never released.
        board_ids_by_code: Mapping<BoardCode, u32>,

        // ── Threads & posts ───────────────────────────────────────────────
        board_thread_counts: Mapping<u32, u32>,
        board_post_counts: Mapping<u32, u32>,
        board_leading_thread: Mapping<u32, u32>,
        threads: Mapping<(u32, u32), Thread>,
        posts: Mapping<(u32, u32), Post>,
        /// (board, thread, ordinal) → post ID.
        thread_posts: Mapping<(u32, u32, u32), u32>,
        user_stats: Mapping<AccountId, UserStats>,
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    #[ink(event)]
    pub struct BoardCreated {
        #[ink(topic)]
        creator: AccountId,
        #[ink(topic)]
        board_id: u32,
        code: BoardCode,
        hash: Hash,
    }

    #[ink(event)]
    pub struct PostPublished {
        #[ink(topic)]
        author: AccountId,
        #[ink(topic)]
        board_id: u32,
        #[ink(topic)]
        thread_id: u32,
        post_id: u32,
        ordinal: u32,
        txt_hash: Hash,
        img_hash: Hash,
    }

    #[ink(event)]
    pub struct StakeDeposited {
        #[ink(topic)]
        staker: AccountId,
        amount: Balance,
        total: Balance,
    }

    #[ink(event)]
    pub struct StakeWithdrawn {
        #[ink(topic)]
        staker: AccountId,
        amount: Balance,
    }

    #[ink(event)]
    pub struct PricesUpdated {
        board_price: Price,
        post_price: Price,
    }

    #[ink(event)]
    pub struct StakeThresholdsUpdated {
        thresholds: StakeThresholds,
    }

    #[ink(event)]
    pub struct FundsRecipientUpdated {
        recipient: Option<AccountId>,
    }

    #[ink(event)]
    pub struct ProceedsSwept {
        #[ink(topic)]
        to: AccountId,
        amount: Balance,
    }

    #[ink(event)]
    pub struct TokenUpdated {
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
        /// Pagination cursor must be at least 1.
        InvalidCursor,
        /// Pagination limit must be at least 1.
        InvalidLimit,
        /// No board with this ID.
        BoardNotFound,
        /// No thread with this ID on the board.
        ThreadNotFound,
        /// Board code is already claimed.
        BoardCodeTaken,
        /// Board code is not lowercase letters followed by zero bytes.
        InvalidBoardCode,
        /// Caller's stake does not grant the required posting privilege.
        InsufficientPrivilege,
        /// Attached value is below the native price.
        InsufficientFunds,
        /// Platform-token allowance is below the token price.
        InsufficientTokenAllowance,
        /// Caller has no stake to withdraw.
        NoStake,
        /// No retained proceeds to sweep.
        NoProceeds,
        /// Thresholds must satisfy txt ≤ img ≤ maximum.
        InvalidStakeThresholds,
        /// Funds recipient rejected the deposit.
        DepositFailed,
        /// Platform-token `transfer_from` failed.
        TokenTransferFailed,
        /// Platform-token allowance query failed.
        TokenQueryFailed,
        /// A native value transfer failed.
        TransferFailed,
        /// An arithmetic operation overflowed.
        Overflow,
    }

    // =========================================================================
    // IMPLEMENTATION
    // =========================================================================

    impl Forum {
        #[ink(constructor)]
        pub fn new(
            token: AccountId,
            funds_recipient: Option<AccountId>,
            board_price: Price,
            post_price: Price,
            stake_thresholds: StakeThresholds,
        ) -> Result<Self, Error> {
            check_thresholds(&stake_thresholds)?;
            Ok(Self {
                owner: Self::env().caller(),
                token,
                funds_recipient,
                retained_proceeds: 0,
                board_price,
                post_price,
                stake_thresholds,
                stakes: Mapping::default(),
                board_count: 0,
                boards: Mapping::default(),
                board_ids_by_code: Mapping::default(),
                board_thread_counts: Mapping::default(),
                board_post_counts: Mapping::default(),
                board_leading_thread: Mapping::default(),
                threads: Mapping::default(),
                posts: Mapping::default(),
                thread_posts: Mapping::default(),
                user_stats: Mapping::default(),
            })
        }

        // =====================================================================
        // STAKING
        // =====================================================================

        /// Add the attached value to the caller's stake, up to the maximum.
        /// Any excess is refunded after the stake is written.
        #[ink(message, payable)]
        pub fn deposit_stake(&mut self) -> Result<Balance, Error> {
            let staker = self.env().caller();
            let value = self.env().transferred_value();
            let current = self.stake_of(staker);

            let room = self.stake_thresholds.maximum.saturating_sub(current);
            let accepted = value.min(room);
            let total = current.checked_add(accepted).ok_or(Error::Overflow)?;
            let refund = value.saturating_sub(accepted);

            self.stakes.insert(staker, &total);
            self.env().emit_event(StakeDeposited {
                staker,
                amount: accepted,
                total,
            });

            if refund > 0 {
                self.env()
                    .transfer(staker, refund)
                    .map_err(|_| Error::TransferFailed)?;
            }
            Ok(accepted)
        }

        #[ink(message)]
        pub fn withdraw_stake(&mut self) -> Result<Balance, Error> {
            let staker = self.env().caller();
            let amount = self.stake_of(staker);
            if amount == 0 {
                return Err(Error::NoStake);
            }

            self.stakes.remove(staker);
            self.env().emit_event(StakeWithdrawn { staker, amount });

            self.env()
                .transfer(staker, amount)
                .map_err(|_| Error::TransferFailed)?;
            Ok(amount)
        }

        #[ink(message)]
        pub fn stake_of(&self, account: AccountId) -> Balance {
            self.stakes.get(account).unwrap_or(0)
        }

        #[ink(message)]
        pub fn get_posting_privilege(&self, account: AccountId) -> PostingPrivilege {
            privilege_for(self.stake_of(account), &self.stake_thresholds)
        }

        // =====================================================================
        // BOARDS
        // =====================================================================

        /// Claim `code` and create a board.  Returns the new board ID.
        #[ink(message, payable)]
        pub fn create_board(&mut self, code: BoardCode, content_hash: Hash) -> Result<u32, Error> {
            let creator = self.env().caller();
            if !crate::validate_board_code(&code) {
                return Err(Error::InvalidBoardCode);
            }
            if self.board_ids_by_code.contains(code) {
                return Err(Error::BoardCodeTaken);
            }
            let board_id = self.board_count.checked_add(1).ok_or(Error::Overflow)?;
            let payment = self.begin_purchase(self.board_price)?;

            // ── State update (before external calls) ──────────────────────
            self.board_count = board_id;
            self.boards.insert(
                board_id,
                &Board {
                    creator,
                    code,
                    content_hash,
                },
            );
            self.board_ids_by_code.insert(code, &board_id);

            self.env().emit_event(BoardCreated {
                creator,
                board_id,
                code,
                hash: content_hash,
            });

            self.finalize_purchase(creator, payment)?;
            Ok(board_id)
        }

        #[ink(message)]
        pub fn validate_board_code(&self, code: BoardCode) -> bool {
            crate::validate_board_code(&code)
        }

        // =====================================================================
        // POSTS
        // =====================================================================

        /// Publish a post.  `thread_id == NULL_THREAD` starts a new thread.
        #[ink(message, payable)]
        pub fn publish_post(
            &mut self,
            board_id: u32,
            thread_id: u32,
            txt_hash: Hash,
            img_hash: Hash,
        ) -> Result<PublishedPost, Error> {
            let author = self.env().caller();
            if !self.board_exists(board_id) {
                return Err(Error::BoardNotFound);
            }

            let privilege = self.get_posting_privilege(author);
            if privilege < PostingPrivilege::TxtOnly {
                return Err(Error::InsufficientPrivilege);
            }
            if has_image(&img_hash) && privilege < PostingPrivilege::TxtWithImg {
                return Err(Error::InsufficientPrivilege);
            }

            let thread_count = self.board_thread_count(board_id);
            let is_new_thread = thread_id == NULL_THREAD;
            let (thread_id, mut thread) = if is_new_thread {
                let id = thread_count.checked_add(1).ok_or(Error::Overflow)?;
                (id, Thread::default())
            } else {
                if thread_id > thread_count {
                    return Err(Error::ThreadNotFound);
                }
                let thread = self
                    .threads
                    .get((board_id, thread_id))
                    .ok_or(Error::ThreadNotFound)?;
                (thread_id, thread)
            };

            let post_id = self
                .board_post_count(board_id)
                .checked_add(1)
                .ok_or(Error::Overflow)?;
            let ordinal = thread.post_count.checked_add(1).ok_or(Error::Overflow)?;
            let mut stats = self.user_stats(author);
            stats.post_count = stats.post_count.checked_add(1).ok_or(Error::Overflow)?;
            stats.last_post_timestamp = self.env().block_timestamp();

            let payment = self.begin_purchase(self.post_price)?;

            // ── State update (before external calls) ──────────────────────
            if is_new_thread {
                self.board_thread_counts.insert(board_id, &thread_id);
            }
            self.posts.insert(
                (board_id, post_id),
                &Post {
                    author,
                    board_id,
                    thread_id,
                    txt_hash,
                    img_hash,
                },
            );
            self.board_post_counts.insert(board_id, &post_id);

            thread.post_count = ordinal;
            self.threads.insert((board_id, thread_id), &thread);
            self.bump_thread(board_id, thread_id);

            self.thread_posts.insert((board_id, thread_id, ordinal), &post_id);
            self.user_stats.insert(author, &stats);

            self.env().emit_event(PostPublished {
                author,
                board_id,
                thread_id,
                post_id,
                ordinal,
                txt_hash,
                img_hash,
            });

            self.finalize_purchase(author, payment)?;
            Ok(PublishedPost {
                thread_id,
                post_id,
                ordinal,
            })
        }

        // =====================================================================
        // ACTIVITY RANKING
        // =====================================================================

        /// Move `thread_id` to the head of its board's activity list.
        ///
        /// No-op when the thread already leads or has reached `BUMP_LIMIT`
        /// posts.  Reads the thread's current post count from storage.
        fn bump_thread(&mut self, board_id: u32, thread_id: u32) {
            let head = self.leading_thread(board_id);
            if head == thread_id {
                return;
            }
            let mut thread = self.thread_node(board_id, thread_id);
            if thread.post_count >= BUMP_LIMIT {
                return;
            }

            self.unlink_thread(board_id, thread_id, &thread);

            if head != NULL_THREAD {
                let mut old_head = self.thread_node(board_id, head);
                old_head.prev_thread_id = thread_id;
                self.threads.insert((board_id, head), &old_head);
            }

            thread.prev_thread_id = NULL_THREAD;
            thread.next_thread_id = head;
            self.threads.insert((board_id, thread_id), &thread);
            self.board_leading_thread.insert(board_id, &thread_id);
        }

        /// Splice `thread` out of the list by joining its neighbours.
        /// `thread` keeps its own stale links; the caller overwrites them.
        fn unlink_thread(&mut self, board_id: u32, thread_id: u32, thread: &Thread) {
            let prev = thread.prev_thread_id;
            let next = thread.next_thread_id;

            if prev != NULL_THREAD {
                let mut node = self.thread_node(board_id, prev);
                node.next_thread_id = next;
                self.threads.insert((board_id, prev), &node);
            } else if self.leading_thread(board_id) == thread_id {
                self.board_leading_thread.insert(board_id, &next);
            }

            if next != NULL_THREAD {
                let mut node = self.thread_node(board_id, next);
                node.prev_thread_id = prev;
                self.threads.insert((board_id, next), &node);
            }
        }

        fn thread_node(&self, board_id: u32, thread_id: u32) -> Thread {
            self.threads.get((board_id, thread_id)).unwrap_or_default()
        }

        // =====================================================================
        // PAGINATED QUERIES
        // =====================================================================

        /// Boards `cursor ..` up to `limit`, and the cursor of the next page.
        #[ink(message)]
        pub fn list_boards(&self, cursor: u32, limit: u32) -> Result<(Vec<Board>, u32), Error> {
            let (len, next) = page(cursor, limit, self.board_count)?;
            let boards = (cursor..cursor + len)
                .filter_map(|id| self.boards.get(id))
                .collect();
            Ok((boards, next))
        }

        /// Posts of a board in publication order; `cursor` is a post ID.
        #[ink(message)]
        pub fn list_board_posts(
            &self,
            board_id: u32,
            cursor: u32,
            limit: u32,
        ) -> Result<(Vec<Post>, u32), Error> {
            if !self.board_exists(board_id) {
                return Err(Error::BoardNotFound);
            }
            let (len, next) = page(cursor, limit, self.board_post_count(board_id))?;
            let posts = (cursor..cursor + len)
                .filter_map(|post_id| self.posts.get((board_id, post_id)))
                .collect();
            Ok((posts, next))
        }

        /// Posts of a thread in order; `cursor` is an ordinal.
        #[ink(message)]
        pub fn list_thread_posts(
            &self,
            board_id: u32,
            thread_id: u32,
            cursor: u32,
            limit: u32,
        ) -> Result<(Vec<Post>, u32), Error> {
            if !self.board_exists(board_id) {
                return Err(Error::BoardNotFound);
            }
            let thread = self.get_thread(board_id, thread_id).ok_or(Error::ThreadNotFound)?;
            let (len, next) = page(cursor, limit, thread.post_count)?;
            let posts = (cursor..cursor + len)
                .filter_map(|ordinal| self.thread_posts.get((board_id, thread_id, ordinal)))
                .filter_map(|post_id| self.posts.get((board_id, post_id)))
                .collect();
            Ok((posts, next))
        }

        /// Thread IDs most recently bumped first.
        ///
        /// `cursor == NULL_THREAD` starts at the head.  Returns the thread to
        /// resume from, `NULL_THREAD` once the list is exhausted.
        #[ink(message)]
        pub fn list_threads_by_activity(
            &self,
            board_id: u32,
            cursor: u32,
            limit: u32,
        ) -> Result<(Vec<u32>, u32), Error> {
            if !self.board_exists(board_id) {
                return Err(Error::BoardNotFound);
            }
            if limit == 0 {
                return Err(Error::InvalidLimit);
            }

            let mut current = if cursor == NULL_THREAD {
                self.leading_thread(board_id)
            } else if cursor <= self.board_thread_count(board_id) {
                cursor
            } else {
                return Err(Error::ThreadNotFound);
            };

            let mut ids = Vec::new();
            while current != NULL_THREAD && ids.len() < limit as usize {
                ids.push(current);
                current = self.thread_node(board_id, current).next_thread_id;
            }
            Ok((ids, current))
        }

        // =====================================================================
        // VIEW FUNCTIONS
        // =====================================================================

        #[ink(message)]
        pub fn board_count(&self) -> u32 {
            self.board_count
        }

        #[ink(message)]
        pub fn get_board(&self, board_id: u32) -> Option<Board> {
            self.boards.get(board_id)
        }

        #[ink(message)]
        pub fn board_id_by_code(&self, code: BoardCode) -> Option<u32> {
            self.board_ids_by_code.get(code)
        }

        #[ink(message)]
        pub fn board_thread_count(&self, board_id: u32) -> u32 {
            self.board_thread_counts.get(board_id).unwrap_or(0)
        }

        #[ink(message)]
        pub fn board_post_count(&self, board_id: u32) -> u32 {
            self.board_post_counts.get(board_id).unwrap_or(0)
        }

        #[ink(message)]
        pub fn leading_thread(&self, board_id: u32) -> u32 {
            self.board_leading_thread.get(board_id).unwrap_or(NULL_THREAD)
        }

        #[ink(message)]
        pub fn get_thread(&self, board_id: u32, thread_id: u32) -> Option<Thread> {
            self.threads.get((board_id, thread_id))
        }

        #[ink(message)]
        pub fn get_post(&self, board_id: u32, post_id: u32) -> Option<Post> {
            self.posts.get((board_id, post_id))
        }

        #[ink(message)]
        pub fn thread_post_id(&self, board_id: u32, thread_id: u32, ordinal: u32) -> Option<u32> {
            self.thread_posts.get((board_id, thread_id, ordinal))
        }

        #[ink(message)]
        pub fn user_stats(&self, account: AccountId) -> UserStats {
            self.user_stats.get(account).unwrap_or_default()
        }

        #[ink(message)]
        pub fn get_prices(&self) -> (Price, Price) {
            (self.board_price, self.post_price)
        }

        #[ink(message)]
        pub fn get_stake_thresholds(&self) -> StakeThresholds {
            self.stake_thresholds
        }

        #[ink(message)]
        pub fn get_funds_recipient(&self) -> Option<AccountId> {
            self.funds_recipient
        }

        #[ink(message)]
        pub fn get_token(&self) -> AccountId {
            self.token
        }

        #[ink(message)]
        pub fn retained_proceeds(&self) -> Balance {
            self.retained_proceeds
        }

        // =====================================================================
        // ADMIN
        // =====================================================================

        #[ink(message)]
        pub fn set_prices(&mut self, board_price: Price, post_price: Price) -> Result<(), Error> {
            self.only_owner()?;
            self.board_price = board_price;
            self.post_price = post_price;
            self.env().emit_event(PricesUpdated {
                board_price,
                post_price,
            });
            Ok(())
        }

        #[ink(message)]
        pub fn set_stake_thresholds(&mut self, thresholds: StakeThresholds) -> Result<(), Error> {
            self.only_owner()?;
            check_thresholds(&thresholds)?;
            self.stake_thresholds = thresholds;
            self.env().emit_event(StakeThresholdsUpdated { thresholds });
            Ok(())
        }

        #[ink(message)]
        pub fn set_funds_recipient(&mut self, recipient: Option<AccountId>) -> Result<(), Error> {
            self.only_owner()?;
            self.funds_recipient = recipient;
            self.env().emit_event(FundsRecipientUpdated { recipient });
            Ok(())
        }

        /// Send proceeds retained while no funds recipient was set to `to`.
        /// Stake collateral is never touched.
        #[ink(message)]
        pub fn sweep_proceeds(&mut self, to: AccountId) -> Result<Balance, Error> {
            self.only_owner()?;
            let amount = self.retained_proceeds;
            if amount == 0 {
                return Err(Error::NoProceeds);
            }

            self.retained_proceeds = 0;
            self.env().emit_event(ProceedsSwept { to, amount });

            self.env()
                .transfer(to, amount)
                .map_err(|_| Error::TransferFailed)?;
            Ok(amount)
        }

        #[ink(message)]
        pub fn set_token(&mut self, token: AccountId) -> Result<(), Error> {
            self.only_owner()?;
            self.token = token;
            self.env().emit_event(TokenUpdated { token });
            Ok(())
        }

        // =====================================================================
        // INTERNAL: Purchase protocol
        // =====================================================================

        fn begin_purchase(&self, price: Price) -> Result<Payment, Error> {
            let buyer = self.env().caller();
            let attached = self.env().transferred_value();
            select_payment(attached, price, || self.query_token_allowance(buyer))
        }

        /// Move the funds checked by `begin_purchase`.  Runs after every
        /// ledger write of the calling message.
        fn finalize_purchase(&mut self, buyer: AccountId, payment: Payment) -> Result<(), Error> {
            match payment {
                Payment::Native { attached, price } => {
                    if price > 0 {
                        match self.funds_recipient {
                            Some(recipient) => self.forward_proceeds(recipient, price)?,
                            None => {
                                self.retained_proceeds = self
                                    .retained_proceeds
                                    .checked_add(price)
                                    .ok_or(Error::Overflow)?;
                            }
                        }
                    }
                    let refund = attached.saturating_sub(price);
                    if refund > 0 {
                        self.env()
                            .transfer(buyer, refund)
                            .map_err(|_| Error::TransferFailed)?;
                    }
                }
                Payment::Token { price } => {
                    if price > 0 {
                        self.pull_tokens(buyer, price)?;
                    }
                }
            }
            Ok(())
        }

        // =====================================================================
        // INTERNAL: Cross-Contract Calls
        // =====================================================================

        fn forward_proceeds(&self, recipient: AccountId, amount: Balance) -> Result<(), Error> {
            let result = build_call::<DefaultEnvironment>()
                .call(recipient)
                .transferred_value(amount)
                .exec_input(
                    ExecutionInput::new(Selector::new(ink::selector_bytes!("deposit")))
                        .push_arg(DEPOSIT_SELECTOR),
                )
                .returns::<Result<(), TokenError>>()
                .try_invoke();

            match result {
                Ok(Ok(Ok(()))) => Ok(()),
                _ => Err(Error::DepositFailed),
            }
        }

        fn pull_tokens(&self, from: AccountId, amount: Balance) -> Result<(), Error> {
            let result = build_call::<DefaultEnvironment>()
                .call(self.token)
                .exec_input(
                    ExecutionInput::new(Selector::new(ink::selector_bytes!("transfer_from")))
                        .push_arg(from)
                        .push_arg(self.env().account_id())
                        .push_arg(amount),
                )
                .returns::<Result<(), TokenError>>()
                .try_invoke();

            match result {
                Ok(Ok(Ok(()))) => Ok(()),
                _ => Err(Error::TokenTransferFailed),
            }
        }

        fn query_token_allowance(&self, owner: AccountId) -> Result<Balance, Error> {
            let result = build_call::<DefaultEnvironment>()
                .call(self.token)
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

        // =====================================================================
        // ACCESS CONTROL
        // =====================================================================

        fn board_exists(&self, board_id: u32) -> bool {
            board_id != 0 && board_id <= self.board_count
        }

        fn only_owner(&self) -> Result<(), Error> {
            if self.env().caller() != self.owner {
                return Err(Error::NotOwner);
            }
            Ok(())
        }
    }

    /// Highest tier whose threshold `stake` meets.
    fn privilege_for(stake: Balance, thresholds: &StakeThresholds) -> PostingPrivilege {
        if stake >= thresholds.post_img_minimum {
            PostingPrivilege::TxtWithImg
        } else if stake >= thresholds.post_txt_minimum {
            PostingPrivilege::TxtOnly
        } else {
            PostingPrivilege::None
        }
    }

    /// Tiers must ascend up to the cap.
    fn check_thresholds(thresholds: &StakeThresholds) -> Result<(), Error> {
        if thresholds.post_txt_minimum > thresholds.post_img_minimum
            || thresholds.post_img_minimum > thresholds.maximum
        {
            return Err(Error::InvalidStakeThresholds);
        }
        Ok(())
    }

    fn has_image(img_hash: &Hash) -> bool {
        img_hash.as_ref().iter().any(|b| *b != 0)
    }

    /// Begin phase of a purchase.
    ///
    /// Attached value selects the native path.  Otherwise the allowance is
    /// queried, and only when the token price is non-zero.
    fn select_payment<F>(attached: Balance, price: Price, allowance: F) -> Result<Payment, Error>
    where
        F: FnOnce() -> Result<Balance, Error>,
    {
        if attached > 0 {
            if attached < price.wei {
                return Err(Error::InsufficientFunds);
            }
            return Ok(Payment::Native {
                attached,
                price: price.wei,
            });
        }
        if price.token > 0 && allowance()? < price.token {
            return Err(Error::InsufficientTokenAllowance);
        }
        Ok(Payment::Token { price: price.token })
    }

    /// Clamp a `(cursor, limit)` request against `count` items.
    /// Returns the page length and the next cursor.
    fn page(cursor: u32, limit: u32, count: u32) -> Result<(u32, u32), Error> {
        if cursor == 0 {
            return Err(Error::InvalidCursor);
        }
        if limit == 0 {
            return Err(Error::InvalidLimit);
        }
        let remaining = count.saturating_sub(cursor - 1);
        let len = limit.min(remaining);
        let next = cursor.checked_add(len).ok_or(Error::Overflow)?;
        Ok((len, next))
    }

    // =========================================================================
    // UNIT TESTS
    // =========================================================================

}
