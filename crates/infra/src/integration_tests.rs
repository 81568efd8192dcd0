//! Integration tests for both engines over the in-memory store.
//!
//! Tests: engine call → store transaction → balances/logs → published events
//!
//! Verifies:
//! - Double entry holds for every accepted voucher
//! - Posting and cancelling are exact inverses on account balances
//! - Stock never goes negative; costing follows the item's valuation method
//! - Transfers move stock between locations without changing the item total
//! - Best-effort flows never propagate ingredient/line failures
//! - Tenant isolation and all-or-nothing transactions

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::Value as JsonValue;

    use hearth_accounting::{
        AccountGroup, AccountId, DateRange, LedgerEntryDraft, NewAccount, VoucherStatus,
        VoucherType,
    };
    use hearth_core::{Entity, TenantId, UserId};
    use hearth_events::{EventBus, EventEnvelope, InMemoryEventBus};
    use hearth_inventory::{
        BomLine, Direction, LocationId, MenuItemId, MovementDraft, MovementType, NewStockItem,
        StockItemId, ValuationMethod,
    };

    use crate::config::EngineConfig;
    use crate::error::{EngineError, ErrorCategory};
    use crate::store::InMemoryBooksStore;
    use crate::valuation_engine::{
        MovementFilter, PurchaseReceipt, ReceiptLine, SaleDeduction, StockTransfer, ValuationEngine,
    };
    use crate::voucher_engine::{NewVoucher, VoucherEngine};

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
    type Store = Arc<InMemoryBooksStore>;

    struct Harness {
        bus: Bus,
        vouchers: VoucherEngine<Store, Bus>,
        stock: ValuationEngine<Store, Bus>,
        tenant: TenantId,
        user: UserId,
    }

    fn setup() -> Harness {
        hearth_observability::init_for_tests();
        let store: Store = Arc::new(InMemoryBooksStore::new());
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let config = EngineConfig::default();
        Harness {
            vouchers: VoucherEngine::new(store.clone(), bus.clone(), config.clone()),
            stock: ValuationEngine::new(store, bus.clone(), config),
            bus,
            tenant: TenantId::new(),
            user: UserId::new(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2026, 10, 16)
    }

    fn open(h: &Harness, code: &str, group: AccountGroup, opening: Decimal) -> AccountId {
        h.vouchers
            .open_account(
                h.tenant,
                NewAccount {
                    code: code.to_string(),
                    name: format!("{code} account"),
                    group,
                    allows_posting: true,
                    opening_balance: opening,
                },
            )
            .unwrap()
            .id()
    }

    fn sale(h: &Harness, on: NaiveDate, cash: AccountId, sales: AccountId, amount: Decimal, auto_post: bool) -> NewVoucher {
        NewVoucher {
            voucher_type: VoucherType::Sales,
            date: on,
            narration: "Counter sale".to_string(),
            party: None,
            entries: vec![
                LedgerEntryDraft::debit(cash, amount),
                LedgerEntryDraft::credit(sales, amount),
            ],
            auto_post,
            created_by: h.user,
        }
    }

    fn balance(h: &Harness, account: AccountId) -> Decimal {
        h.vouchers.account(h.tenant, account).unwrap().current_balance()
    }

    // ---------------------------------------------------------------------
    // Voucher Engine
    // ---------------------------------------------------------------------

    #[test]
    fn auto_posted_voucher_moves_both_balances() {
        let h = setup();
        let cash = open(&h, "1000", AccountGroup::Assets, dec!(500));
        let sales = open(&h, "4000", AccountGroup::Income, Decimal::ZERO);

        let v = h
            .vouchers
            .create_voucher(h.tenant, sale(&h, today(), cash, sales, dec!(1000), true))
            .unwrap();

        assert_eq!(v.status(), VoucherStatus::Posted);
        assert_eq!(v.number_string(), "SLS-2026-000001");
        assert_eq!(v.total_amount(), dec!(1000));
        assert_eq!(v.posted_by(), Some(h.user));
        assert!(v.entries().iter().all(|e| e.posted));
        assert_eq!(balance(&h, cash), dec!(1500));
        assert_eq!(balance(&h, sales), dec!(1000));
    }

    #[test]
    fn unbalanced_voucher_is_rejected_without_consuming_a_number() {
        let h = setup();
        let cash = open(&h, "1000", AccountGroup::Assets, Decimal::ZERO);
        let sales = open(&h, "4000", AccountGroup::Income, Decimal::ZERO);

        let mut input = sale(&h, today(), cash, sales, dec!(100), true);
        input.entries[1] = LedgerEntryDraft::credit(sales, dec!(90));
        let err = h.vouchers.create_voucher(h.tenant, input).unwrap_err();

        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(balance(&h, cash), Decimal::ZERO);
        let next = h
            .vouchers
            .create_voucher(h.tenant, sale(&h, today(), cash, sales, dec!(100), false))
            .unwrap();
        assert_eq!(next.number_string(), "SLS-2026-000001");
    }

    #[test]
    fn entry_with_both_sides_is_rejected() {
        let h = setup();
        let cash = open(&h, "1000", AccountGroup::Assets, Decimal::ZERO);
        let sales = open(&h, "4000", AccountGroup::Income, Decimal::ZERO);

        let mut input = sale(&h, today(), cash, sales, dec!(100), false);
        input.entries[0].credit = Some(dec!(100));

        let err = h.vouchers.create_voucher(h.tenant, input).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn group_account_is_rejected_by_name() {
        let h = setup();
        let cash = open(&h, "1000", AccountGroup::Assets, Decimal::ZERO);
        let group = h
            .vouchers
            .open_account(
                h.tenant,
                NewAccount {
                    code: "4".to_string(),
                    name: "Revenue".to_string(),
                    group: AccountGroup::Income,
                    allows_posting: false,
                    opening_balance: Decimal::ZERO,
                },
            )
            .unwrap()
            .id();

        let err = h
            .vouchers
            .create_voucher(h.tenant, sale(&h, today(), cash, group, dec!(10), true))
            .unwrap_err();

        assert!(matches!(&err, EngineError::Validation(msg) if msg.contains("Revenue")));
        assert_eq!(balance(&h, cash), Decimal::ZERO);
    }

    #[test]
    fn post_then_cancel_restores_balances_and_keeps_entries() {
        let h = setup();
        let cash = open(&h, "1000", AccountGroup::Assets, dec!(200));
        let sales = open(&h, "4000", AccountGroup::Income, dec!(50));

        let draft = h
            .vouchers
            .create_voucher(h.tenant, sale(&h, today(), cash, sales, dec!(75), false))
            .unwrap();
        assert_eq!(draft.status(), VoucherStatus::Draft);
        assert_eq!(balance(&h, cash), dec!(200));

        h.vouchers.post_voucher(h.tenant, draft.id(), h.user).unwrap();
        assert_eq!(balance(&h, cash), dec!(275));
        assert_eq!(balance(&h, sales), dec!(125));

        let cancelled = h
            .vouchers
            .cancel_voucher(h.tenant, draft.id(), "keyed twice", h.user)
            .unwrap();

        assert_eq!(cancelled.status(), VoucherStatus::Cancelled);
        assert_eq!(cancelled.entries().len(), 2);
        assert!(cancelled.entries().iter().all(|e| !e.posted));
        assert!(cancelled.narration().ends_with("Cancelled: keyed twice"));
        assert_eq!(balance(&h, cash), dec!(200));
        assert_eq!(balance(&h, sales), dec!(50));
    }

    #[test]
    fn cancelling_a_draft_leaves_balances_untouched() {
        let h = setup();
        let cash = open(&h, "1000", AccountGroup::Assets, dec!(10));
        let sales = open(&h, "4000", AccountGroup::Income, Decimal::ZERO);

        let v = h
            .vouchers
            .create_voucher(h.tenant, sale(&h, today(), cash, sales, dec!(5), false))
            .unwrap();
        h.vouchers.cancel_voucher(h.tenant, v.id(), "not needed", h.user).unwrap();

        assert_eq!(balance(&h, cash), dec!(10));
        assert_eq!(balance(&h, sales), Decimal::ZERO);
    }

    #[test]
    fn lifecycle_conflicts_are_reported() {
        let h = setup();
        let cash = open(&h, "1000", AccountGroup::Assets, Decimal::ZERO);
        let sales = open(&h, "4000", AccountGroup::Income, Decimal::ZERO);
        let v = h
            .vouchers
            .create_voucher(h.tenant, sale(&h, today(), cash, sales, dec!(5), true))
            .unwrap();

        let twice = h.vouchers.post_voucher(h.tenant, v.id(), h.user).unwrap_err();
        assert_eq!(twice.category(), ErrorCategory::StateConflict);

        h.vouchers.cancel_voucher(h.tenant, v.id(), "void", h.user).unwrap();
        let again = h
            .vouchers
            .cancel_voucher(h.tenant, v.id(), "void", h.user)
            .unwrap_err();
        assert!(matches!(again, EngineError::StateConflict(_)));
        let post_cancelled = h.vouchers.post_voucher(h.tenant, v.id(), h.user).unwrap_err();
        assert!(matches!(post_cancelled, EngineError::StateConflict(_)));
        assert_eq!(balance(&h, cash), Decimal::ZERO);
    }

    #[test]
    fn numbers_follow_the_fiscal_year_of_the_voucher_date() {
        let h = setup();
        let cash = open(&h, "1000", AccountGroup::Assets, Decimal::ZERO);
        let sales = open(&h, "4000", AccountGroup::Income, Decimal::ZERO);

        let june = h
            .vouchers
            .create_voucher(h.tenant, sale(&h, date(2026, 6, 30), cash, sales, dec!(1), false))
            .unwrap();
        let july = h
            .vouchers
            .create_voucher(h.tenant, sale(&h, date(2026, 7, 1), cash, sales, dec!(1), false))
            .unwrap();
        let august = h
            .vouchers
            .create_voucher(h.tenant, sale(&h, date(2026, 8, 3), cash, sales, dec!(1), false))
            .unwrap();

        assert_eq!(june.number_string(), "SLS-2025-000001");
        assert_eq!(july.number_string(), "SLS-2026-000001");
        assert_eq!(august.number_string(), "SLS-2026-000002");
    }

    #[test]
    fn voucher_types_have_independent_series() {
        let h = setup();
        let cash = open(&h, "1000", AccountGroup::Assets, Decimal::ZERO);
        let sales = open(&h, "4000", AccountGroup::Income, Decimal::ZERO);

        h.vouchers
            .create_voucher(h.tenant, sale(&h, today(), cash, sales, dec!(1), false))
            .unwrap();
        let mut journal = sale(&h, today(), cash, sales, dec!(1), false);
        journal.voucher_type = VoucherType::Journal;
        let j = h.vouchers.create_voucher(h.tenant, journal).unwrap();

        assert_eq!(j.number_string(), "JRN-2026-000001");
    }

    #[test]
    fn tenants_cannot_reach_each_others_books() {
        let h = setup();
        let cash = open(&h, "1000", AccountGroup::Assets, dec!(100));
        let sales = open(&h, "4000", AccountGroup::Income, Decimal::ZERO);
        let other = TenantId::new();

        assert!(matches!(
            h.vouchers.account(other, cash),
            Err(EngineError::NotFound(_))
        ));
        let err = h
            .vouchers
            .create_voucher(other, sale(&h, today(), cash, sales, dec!(10), true))
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
        assert_eq!(balance(&h, cash), dec!(100));

        let v = h
            .vouchers
            .create_voucher(h.tenant, sale(&h, today(), cash, sales, dec!(10), false))
            .unwrap();
        assert!(h.vouchers.post_voucher(other, v.id(), h.user).is_err());
        assert_eq!(h.vouchers.voucher(h.tenant, v.id()).unwrap().status(), VoucherStatus::Draft);
    }

    #[test]
    fn ledger_orders_by_date_and_ends_at_current_balance() {
        let h = setup();
        let cash = open(&h, "1000", AccountGroup::Assets, dec!(100));
        let sales = open(&h, "4000", AccountGroup::Income, Decimal::ZERO);

        // Keyed out of date order.
        for (day, amount) in [(20, dec!(30)), (5, dec!(10)), (12, dec!(20))] {
            h.vouchers
                .create_voucher(h.tenant, sale(&h, date(2026, 10, day), cash, sales, amount, true))
                .unwrap();
        }
        let draft = h
            .vouchers
            .create_voucher(h.tenant, sale(&h, date(2026, 10, 1), cash, sales, dec!(999), false))
            .unwrap();
        assert_eq!(draft.status(), VoucherStatus::Draft);

        let ledger = h
            .vouchers
            .account_ledger(h.tenant, cash, DateRange::all(), None, None)
            .unwrap();

        let dates: Vec<u32> = ledger.lines.iter().map(|l| chrono::Datelike::day(&l.date)).collect();
        assert_eq!(dates, vec![5, 12, 20]);
        let running: Vec<Decimal> = ledger.lines.iter().map(|l| l.running_balance).collect();
        assert_eq!(running, vec![dec!(110), dec!(130), dec!(160)]);
        assert_eq!(ledger.total_debit, dec!(60));
        assert_eq!(ledger.closing_balance, balance(&h, cash));

        let window = h
            .vouchers
            .account_ledger(h.tenant, cash, DateRange::between(date(2026, 10, 10), date(2026, 10, 31)), None, Some(1))
            .unwrap();
        assert_eq!(window.opening_balance, dec!(110));
        assert_eq!(window.line_count, 2);
        assert_eq!(window.lines.len(), 1);
        assert_eq!(window.closing_balance, dec!(160));
    }

    #[test]
    fn day_book_groups_live_vouchers_by_type() {
        let h = setup();
        let cash = open(&h, "1000", AccountGroup::Assets, Decimal::ZERO);
        let sales = open(&h, "4000", AccountGroup::Income, Decimal::ZERO);

        h.vouchers
            .create_voucher(h.tenant, sale(&h, today(), cash, sales, dec!(40), true))
            .unwrap();
        h.vouchers
            .create_voucher(h.tenant, sale(&h, today(), cash, sales, dec!(60), false))
            .unwrap();
        let void = h
            .vouchers
            .create_voucher(h.tenant, sale(&h, today(), cash, sales, dec!(500), true))
            .unwrap();
        h.vouchers.cancel_voucher(h.tenant, void.id(), "void", h.user).unwrap();
        let mut journal = sale(&h, today(), cash, sales, dec!(7), true);
        journal.voucher_type = VoucherType::Journal;
        h.vouchers.create_voucher(h.tenant, journal).unwrap();
        h.vouchers
            .create_voucher(h.tenant, sale(&h, date(2026, 10, 17), cash, sales, dec!(1), true))
            .unwrap();

        let book = h.vouchers.day_book(h.tenant, today()).unwrap();

        assert_eq!(book.voucher_count, 3);
        assert_eq!(book.grand_total, dec!(107));
        let sales_group = &book.groups[&VoucherType::Sales];
        assert_eq!(sales_group.total, dec!(100));
        let numbers: Vec<&str> = sales_group.vouchers.iter().map(|r| r.number.as_str()).collect();
        assert_eq!(numbers, vec!["SLS-2026-000001", "SLS-2026-000002"]);
        assert_eq!(book.groups[&VoucherType::Journal].total, dec!(7));
    }

    #[test]
    fn day_book_keeps_each_series_in_number_order() {
        let h = setup();
        let cash = open(&h, "1000", AccountGroup::Assets, Decimal::ZERO);
        let sales = open(&h, "4000", AccountGroup::Income, Decimal::ZERO);

        // Interleave two series so their sequences collide.
        for (kind, amount) in [
            (VoucherType::Journal, dec!(1)),
            (VoucherType::Sales, dec!(2)),
            (VoucherType::Journal, dec!(3)),
            (VoucherType::Sales, dec!(4)),
            (VoucherType::Sales, dec!(5)),
        ] {
            let mut input = sale(&h, today(), cash, sales, amount, true);
            input.voucher_type = kind;
            h.vouchers.create_voucher(h.tenant, input).unwrap();
        }

        let book = h.vouchers.day_book(h.tenant, today()).unwrap();

        let kinds: Vec<VoucherType> = book.groups.keys().copied().collect();
        assert_eq!(kinds, vec![VoucherType::Journal, VoucherType::Sales]);
        let numbers = |kind: VoucherType| -> Vec<String> {
            book.groups[&kind].vouchers.iter().map(|r| r.number.clone()).collect()
        };
        assert_eq!(numbers(VoucherType::Journal), vec!["JRN-2026-000001", "JRN-2026-000002"]);
        assert_eq!(
            numbers(VoucherType::Sales),
            vec!["SLS-2026-000001", "SLS-2026-000002", "SLS-2026-000003"]
        );
        assert_eq!(book.groups[&VoucherType::Sales].total, dec!(11));
    }

    #[test]
    fn legs_past_the_decimal_range_are_rejected() {
        let h = setup();
        let cash = open(&h, "1000", AccountGroup::Assets, Decimal::ZERO);
        let sales = open(&h, "4000", AccountGroup::Income, Decimal::ZERO);

        let mut input = sale(&h, today(), cash, sales, dec!(1), true);
        input.entries = vec![
            LedgerEntryDraft::debit(cash, Decimal::MAX),
            LedgerEntryDraft::debit(cash, Decimal::MAX),
            LedgerEntryDraft::credit(sales, dec!(1)),
        ];
        let err = h.vouchers.create_voucher(h.tenant, input).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(err.category(), ErrorCategory::Validation);

        let v = h
            .vouchers
            .create_voucher(h.tenant, sale(&h, today(), cash, sales, dec!(1), true))
            .unwrap();
        assert_eq!(v.number_string(), "SLS-2026-000001");
        assert_eq!(balance(&h, cash), dec!(1));
    }

    #[test]
    fn balance_past_the_decimal_range_rolls_the_voucher_back() {
        let h = setup();
        let cash = open(&h, "1000", AccountGroup::Assets, Decimal::ZERO);
        let sales = open(&h, "4000", AccountGroup::Income, Decimal::ZERO);
        let near_max = Decimal::MAX - dec!(10);

        h.vouchers
            .create_voucher(h.tenant, sale(&h, today(), cash, sales, near_max, true))
            .unwrap();
        let err = h
            .vouchers
            .create_voucher(h.tenant, sale(&h, today(), cash, sales, dec!(100), true))
            .unwrap_err();

        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(balance(&h, cash), near_max);
        assert_eq!(balance(&h, sales), near_max);
        let next = h
            .vouchers
            .create_voucher(h.tenant, sale(&h, today(), cash, sales, dec!(5), true))
            .unwrap();
        assert_eq!(next.number_string(), "SLS-2026-000002");
        assert_eq!(balance(&h, cash), near_max + dec!(5));
    }

    #[test]
    fn voucher_events_are_published_after_commit() {
        let h = setup();
        let sub = h.bus.subscribe();
        let cash = open(&h, "1000", AccountGroup::Assets, Decimal::ZERO);
        let sales = open(&h, "4000", AccountGroup::Income, Decimal::ZERO);

        let v = h
            .vouchers
            .create_voucher(h.tenant, sale(&h, today(), cash, sales, dec!(5), true))
            .unwrap();
        let mut bad = sale(&h, today(), cash, sales, dec!(5), true);
        bad.entries.pop();
        assert!(h.vouchers.create_voucher(h.tenant, bad).is_err());

        let published = sub.drain();
        let types: Vec<&str> = published.iter().map(|e| e.event_type()).collect();
        assert_eq!(types, vec!["accounting.voucher.created", "accounting.voucher.posted"]);
        let seqs: Vec<u64> = published.iter().map(|e| e.sequence_number()).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert!(published.iter().all(|e| e.tenant_id() == h.tenant));
        assert_eq!(published[0].aggregate_id().as_uuid(), v.id().as_uuid());
    }

    // ---------------------------------------------------------------------
    // Valuation Engine
    // ---------------------------------------------------------------------

    fn item(h: &Harness, code: &str, method: ValuationMethod) -> StockItemId {
        h.stock
            .register_item(
                h.tenant,
                NewStockItem {
                    code: code.to_string(),
                    name: format!("Item {code}"),
                    base_unit: "kg".to_string(),
                    valuation_method: method,
                    tracks_batches: method == ValuationMethod::Fifo,
                    standard_cost: Decimal::ZERO,
                },
            )
            .unwrap()
            .id()
    }

    fn movement(h: &Harness, item: StockItemId, kind: MovementType, qty: Decimal, rate: Decimal) -> MovementDraft {
        MovementDraft::new(item, kind, today(), qty, rate, h.user)
    }

    fn stock_of(h: &Harness, item: StockItemId) -> Decimal {
        h.stock.stock_item(h.tenant, item).unwrap().current_stock()
    }

    #[test]
    fn purchase_updates_weighted_average_and_last_rate() {
        let h = setup();
        let oil = item(&h, "OIL", ValuationMethod::WeightedAverage);
        h.stock
            .create_movement(h.tenant, movement(&h, oil, MovementType::AdjustmentIn, dec!(100), dec!(10)))
            .unwrap();

        let preview = h
            .stock
            .calculate_weighted_average_cost(h.tenant, oil, dec!(50), dec!(12))
            .unwrap();
        let m = h
            .stock
            .create_movement(h.tenant, movement(&h, oil, MovementType::PurchaseIn, dec!(50), dec!(12)))
            .unwrap();

        let oil_now = h.stock.stock_item(h.tenant, oil).unwrap();
        assert_eq!(m.balance_after, dec!(150));
        assert_eq!(oil_now.current_stock(), dec!(150));
        assert_eq!(oil_now.average_cost().round_dp(3), dec!(10.667));
        assert_eq!(oil_now.average_cost(), preview);
        assert_eq!(oil_now.last_purchase_rate(), Some(dec!(12)));
    }

    #[test]
    fn outward_movement_is_costed_at_average_not_caller_rate() {
        let h = setup();
        let oil = item(&h, "OIL", ValuationMethod::WeightedAverage);
        h.stock
            .create_movement(h.tenant, movement(&h, oil, MovementType::AdjustmentIn, dec!(10), dec!(4)))
            .unwrap();

        let out = h
            .stock
            .create_movement(h.tenant, movement(&h, oil, MovementType::Expired, dec!(3), dec!(100)))
            .unwrap();

        assert_eq!(out.rate, dec!(4));
        assert_eq!(out.total_amount, dec!(12));
        assert_eq!(out.balance_after, dec!(7));
    }

    #[test]
    fn fifo_consumes_oldest_batches_and_flags_them() {
        let h = setup();
        let flour = item(&h, "FLR", ValuationMethod::Fifo);
        let receipt = PurchaseReceipt {
            purchase_id: "PO-7".to_string(),
            date: today(),
            location_id: None,
            lines: vec![
                ReceiptLine {
                    item_id: flour,
                    quantity: dec!(30),
                    rate: dec!(8),
                    unit: None,
                    batch_label: Some("LOT-A".to_string()),
                    expiry_date: Some(date(2027, 1, 1)),
                },
                ReceiptLine {
                    item_id: flour,
                    quantity: dec!(20),
                    rate: dec!(9),
                    unit: None,
                    batch_label: Some("LOT-B".to_string()),
                    expiry_date: None,
                },
            ],
            created_by: h.user,
        };
        assert!(h.stock.record_purchase_receipt(h.tenant, receipt).is_complete());

        let preview = h.stock.calculate_fifo_cost(h.tenant, flour, dec!(40)).unwrap();
        assert_eq!(preview.total, dec!(330));
        assert_eq!(h.stock.open_batches(h.tenant, flour).unwrap().len(), 2);

        let out = h
            .stock
            .create_movement(h.tenant, movement(&h, flour, MovementType::SalesOut, dec!(40), Decimal::ZERO))
            .unwrap();

        assert_eq!(out.total_amount, dec!(330));
        assert_eq!(out.allocations.len(), 2);
        let open = h.stock.open_batches(h.tenant, flour).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].label(), "LOT-B");
        assert_eq!(open[0].remaining_quantity(), dec!(10));
        assert_eq!(stock_of(&h, flour), dec!(10));
    }

    #[test]
    fn movement_that_would_go_negative_is_rejected_and_changes_nothing() {
        let h = setup();
        let salt = item(&h, "SALT", ValuationMethod::WeightedAverage);
        h.stock
            .create_movement(h.tenant, movement(&h, salt, MovementType::AdjustmentIn, dec!(5), dec!(1)))
            .unwrap();

        let err = h
            .stock
            .create_movement(h.tenant, movement(&h, salt, MovementType::SalesOut, dec!(6), Decimal::ZERO))
            .unwrap_err();

        assert_eq!(err.category(), ErrorCategory::ResourceInsufficiency);
        assert_eq!(stock_of(&h, salt), dec!(5));
        let history = h
            .stock
            .movement_history(h.tenant, &MovementFilter::default(), None, None)
            .unwrap();
        assert_eq!(history.total, 1);
    }

    #[test]
    fn transfer_moves_stock_between_locations_only() {
        let h = setup();
        let rice = item(&h, "RICE", ValuationMethod::WeightedAverage);
        let (store_room, kitchen) = (LocationId::new(), LocationId::new());
        h.stock
            .create_movement(
                h.tenant,
                movement(&h, rice, MovementType::PurchaseIn, dec!(50), dec!(2)).to_location(store_room),
            )
            .unwrap();

        let record = h
            .stock
            .transfer_stock(
                h.tenant,
                StockTransfer {
                    item_id: rice,
                    from_location: store_room,
                    to_location: kitchen,
                    quantity: dec!(10),
                    date: today(),
                    notes: None,
                    created_by: h.user,
                },
            )
            .unwrap();

        let at = |loc| h.stock.location_stock(h.tenant, loc, rice).unwrap().map(|g| g.quantity());
        assert_eq!(at(store_room), Some(dec!(40)));
        assert_eq!(at(kitchen), Some(dec!(10)));
        assert_eq!(stock_of(&h, rice), dec!(50));
        assert_eq!(record.outward.movement_type, MovementType::TransferOut);
        assert_eq!(record.inward.movement_type, MovementType::TransferIn);
        assert_eq!(record.inward.linked_movement, Some(record.outward.id));

        let into_kitchen = h
            .stock
            .movement_history(
                h.tenant,
                &MovementFilter {
                    location_id: Some(kitchen),
                    movement_type: Some(MovementType::TransferIn),
                    ..MovementFilter::default()
                },
                None,
                None,
            )
            .unwrap();
        assert_eq!(into_kitchen.total, 1);
    }

    #[test]
    fn transfer_rejects_same_location_and_short_source() {
        let h = setup();
        let rice = item(&h, "RICE", ValuationMethod::WeightedAverage);
        let (a, b) = (LocationId::new(), LocationId::new());
        h.stock
            .create_movement(h.tenant, movement(&h, rice, MovementType::PurchaseIn, dec!(5), dec!(2)).to_location(a))
            .unwrap();
        let transfer = |from, to, quantity| StockTransfer {
            item_id: rice,
            from_location: from,
            to_location: to,
            quantity,
            date: today(),
            notes: None,
            created_by: h.user,
        };

        let same = h.stock.transfer_stock(h.tenant, transfer(a, a, dec!(1))).unwrap_err();
        assert_eq!(same.category(), ErrorCategory::StateConflict);

        let short = h.stock.transfer_stock(h.tenant, transfer(a, b, dec!(6))).unwrap_err();
        assert!(matches!(short, EngineError::InsufficientResource(_)));

        let empty_source = h.stock.transfer_stock(h.tenant, transfer(b, a, dec!(1))).unwrap_err();
        assert!(matches!(empty_source, EngineError::InsufficientResource(_)));

        assert_eq!(h.stock.location_stock(h.tenant, a, rice).unwrap().map(|g| g.quantity()), Some(dec!(5)));
        assert!(h.stock.location_stock(h.tenant, b, rice).unwrap().is_none());
    }

    #[test]
    fn outward_from_unknown_location_is_rejected_atomically() {
        let h = setup();
        let rice = item(&h, "RICE", ValuationMethod::WeightedAverage);
        h.stock
            .create_movement(h.tenant, movement(&h, rice, MovementType::AdjustmentIn, dec!(5), dec!(2)))
            .unwrap();

        let err = h
            .stock
            .create_movement(
                h.tenant,
                movement(&h, rice, MovementType::SalesOut, dec!(1), Decimal::ZERO).from_location(LocationId::new()),
            )
            .unwrap_err();

        assert!(matches!(err, EngineError::NotFound(_)));
        assert_eq!(stock_of(&h, rice), dec!(5));
    }

    #[test]
    fn sale_deduction_continues_past_a_short_ingredient() {
        let h = setup();
        let cheese = item(&h, "CHS", ValuationMethod::WeightedAverage);
        let basil = item(&h, "BSL", ValuationMethod::WeightedAverage);
        let dough = item(&h, "DGH", ValuationMethod::WeightedAverage);
        for (id, qty) in [(cheese, dec!(10)), (dough, dec!(10))] {
            h.stock
                .create_movement(h.tenant, movement(&h, id, MovementType::PurchaseIn, qty, dec!(3)))
                .unwrap();
        }
        let pizza = MenuItemId::new();
        h.stock
            .define_recipe(
                h.tenant,
                pizza,
                vec![
                    BomLine { stock_item_id: cheese, quantity_per_serving: dec!(0.2) },
                    BomLine { stock_item_id: basil, quantity_per_serving: dec!(0.01) },
                    BomLine { stock_item_id: dough, quantity_per_serving: dec!(0.3) },
                ],
            )
            .unwrap();

        let outcome = h
            .stock
            .deduct_stock_for_sale(
                h.tenant,
                SaleDeduction {
                    order_id: "ORD-42".to_string(),
                    menu_item_id: pizza,
                    servings: dec!(2),
                    location_id: None,
                    date: today(),
                    created_by: h.user,
                },
            )
            .unwrap();

        assert_eq!(outcome.recorded.len(), 2);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].item_id, basil);
        assert_eq!(outcome.failed[0].error.category(), ErrorCategory::ResourceInsufficiency);
        assert_eq!(stock_of(&h, cheese), dec!(9.6));
        assert_eq!(stock_of(&h, dough), dec!(9.4));
        assert_eq!(stock_of(&h, basil), Decimal::ZERO);
    }

    #[test]
    fn sale_of_item_without_recipe_deducts_nothing() {
        let h = setup();
        let outcome = h
            .stock
            .deduct_stock_for_sale(
                h.tenant,
                SaleDeduction {
                    order_id: "ORD-1".to_string(),
                    menu_item_id: MenuItemId::new(),
                    servings: dec!(1),
                    location_id: None,
                    date: today(),
                    created_by: h.user,
                },
            )
            .unwrap();
        assert!(outcome.recorded.is_empty());
        assert!(outcome.is_complete());
    }

    #[test]
    fn receipt_line_failures_do_not_block_other_lines() {
        let h = setup();
        let milk = item(&h, "MLK", ValuationMethod::WeightedAverage);
        let receipt = PurchaseReceipt {
            purchase_id: "PO-9".to_string(),
            date: today(),
            location_id: Some(LocationId::new()),
            lines: vec![
                ReceiptLine {
                    item_id: StockItemId::new(),
                    quantity: dec!(1),
                    rate: dec!(1),
                    unit: None,
                    batch_label: None,
                    expiry_date: None,
                },
                ReceiptLine {
                    item_id: milk,
                    quantity: dec!(12),
                    rate: dec!(1.5),
                    unit: Some("l".to_string()),
                    batch_label: None,
                    expiry_date: None,
                },
            ],
            created_by: h.user,
        };

        let outcome = h.stock.record_purchase_receipt(h.tenant, receipt);

        assert_eq!(outcome.recorded.len(), 1);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].line, 0);
        assert!(matches!(outcome.failed[0].error, EngineError::NotFound(_)));
        assert_eq!(stock_of(&h, milk), dec!(12));
        let recorded = &outcome.recorded[0];
        assert_eq!(recorded.unit, "l");
        assert_eq!(recorded.reference.as_ref().map(|r| r.id.as_str()), Some("PO-9"));
    }

    #[test]
    fn movement_numbers_and_history_order() {
        let h = setup();
        let salt = item(&h, "SALT", ValuationMethod::WeightedAverage);
        let first = h
            .stock
            .create_movement(h.tenant, movement(&h, salt, MovementType::AdjustmentIn, dec!(5), dec!(1)))
            .unwrap();
        let second = h
            .stock
            .create_movement(h.tenant, movement(&h, salt, MovementType::AdjustmentOut, dec!(1), Decimal::ZERO))
            .unwrap();

        assert_eq!(first.number_string(), "SM-2026-000001");
        assert_eq!(second.number_string(), "SM-2026-000002");

        let history = h
            .stock
            .movement_history(
                h.tenant,
                &MovementFilter {
                    item_id: Some(salt),
                    ..MovementFilter::default()
                },
                None,
                Some(1),
            )
            .unwrap();
        assert_eq!(history.total, 2);
        assert_eq!(history.movements.len(), 1);
        assert_eq!(history.movements[0].id, second.id);
    }

    #[test]
    fn stock_items_are_tenant_scoped() {
        let h = setup();
        let salt = item(&h, "SALT", ValuationMethod::WeightedAverage);
        let other = TenantId::new();

        let err = h
            .stock
            .create_movement(other, movement(&h, salt, MovementType::AdjustmentIn, dec!(5), dec!(1)))
            .unwrap_err();

        assert!(matches!(err, EngineError::NotFound(_)));
        assert_eq!(stock_of(&h, salt), Decimal::ZERO);
    }

    #[test]
    fn stock_events_carry_item_stream_versions() {
        let h = setup();
        let sub = h.bus.subscribe();
        let rice = item(&h, "RICE", ValuationMethod::WeightedAverage);
        let (a, b) = (LocationId::new(), LocationId::new());
        h.stock
            .create_movement(h.tenant, movement(&h, rice, MovementType::PurchaseIn, dec!(5), dec!(2)).to_location(a))
            .unwrap();
        h.stock
            .transfer_stock(
                h.tenant,
                StockTransfer {
                    item_id: rice,
                    from_location: a,
                    to_location: b,
                    quantity: dec!(2),
                    date: today(),
                    notes: None,
                    created_by: h.user,
                },
            )
            .unwrap();

        let published = sub.drain();
        let seqs: Vec<u64> = published.iter().map(|e| e.sequence_number()).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert!(published.iter().all(|e| e.event_type() == "inventory.movement.recorded"));
    }

    #[test]
    fn oversized_movement_value_is_rejected_and_the_item_stays_usable() {
        let h = setup();
        let oil = item(&h, "OIL", ValuationMethod::WeightedAverage);
        let huge = Decimal::from(10_000_000_000_000_000_000u64);

        let err = h
            .stock
            .create_movement(h.tenant, movement(&h, oil, MovementType::PurchaseIn, huge, huge))
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let fetched = h.stock.stock_item(h.tenant, oil).unwrap();
        assert_eq!(fetched.current_stock(), Decimal::ZERO);
        let recorded = h
            .stock
            .create_movement(h.tenant, movement(&h, oil, MovementType::PurchaseIn, dec!(2), dec!(3)))
            .unwrap();
        assert_eq!(recorded.number_string(), "SM-2026-000001");
        assert_eq!(stock_of(&h, oil), dec!(2));
    }

    #[test]
    fn oversized_cost_previews_are_rejected() {
        let h = setup();
        let oil = item(&h, "OIL", ValuationMethod::WeightedAverage);
        h.stock
            .create_movement(h.tenant, movement(&h, oil, MovementType::PurchaseIn, dec!(10), dec!(10)))
            .unwrap();
        let huge = Decimal::MAX / dec!(2);

        let err = h
            .stock
            .calculate_weighted_average_cost(h.tenant, oil, huge, huge)
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        let err = h.stock.calculate_fifo_cost(h.tenant, oil, huge).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(stock_of(&h, oil), dec!(10));
    }

    // ---------------------------------------------------------------------
    // Concurrency
    // ---------------------------------------------------------------------

    #[test]
    fn concurrent_writers_on_one_tenant_serialize() {
        const THREADS: usize = 4;
        const ROUNDS: usize = 20;

        let h = setup();
        let cash = open(&h, "1000", AccountGroup::Assets, Decimal::ZERO);
        let sales = open(&h, "4000", AccountGroup::Income, Decimal::ZERO);
        let flour = item(&h, "FLR", ValuationMethod::WeightedAverage);

        let numbers: Vec<String> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..THREADS)
                .map(|t| {
                    let h = &h;
                    scope.spawn(move || {
                        let mut numbers = Vec::with_capacity(ROUNDS);
                        for round in 0..ROUNDS {
                            let amount = Decimal::from(t * ROUNDS + round + 1);
                            let v = h
                                .vouchers
                                .create_voucher(h.tenant, sale(h, today(), cash, sales, amount, true))
                                .unwrap();
                            numbers.push(v.number_string());

                            h.stock
                                .create_movement(h.tenant, movement(h, flour, MovementType::AdjustmentIn, dec!(2), dec!(1)))
                                .unwrap();
                            h.stock
                                .create_movement(
                                    h.tenant,
                                    movement(h, flour, MovementType::AdjustmentOut, dec!(1), Decimal::ZERO),
                                )
                                .unwrap();
                        }
                        numbers
                    })
                })
                .collect();
            workers.into_iter().flat_map(|w| w.join().unwrap()).collect()
        });

        let total = THREADS * ROUNDS;
        let mut numbers = numbers;
        numbers.sort();
        let expected: Vec<String> = (1..=total).map(|n| format!("SLS-2026-{n:06}")).collect();
        assert_eq!(numbers, expected);

        let sum_of_amounts = Decimal::from(total * (total + 1) / 2);
        assert_eq!(balance(&h, cash), sum_of_amounts);
        assert_eq!(balance(&h, sales), sum_of_amounts);

        let mut history = h
            .stock
            .movement_history(
                h.tenant,
                &MovementFilter {
                    item_id: Some(flour),
                    ..MovementFilter::default()
                },
                None,
                Some(500),
            )
            .unwrap()
            .movements;
        assert_eq!(history.len(), 2 * total);
        history.sort_by_key(|m| m.position);
        let mut running = Decimal::ZERO;
        for m in &history {
            running = match m.movement_type.direction() {
                Direction::Inward => running + m.quantity,
                Direction::Outward => running - m.quantity,
            };
            assert_eq!(m.balance_after, running, "movement {}", m.number_string());
        }
        assert_eq!(stock_of(&h, flour), Decimal::from(total));
    }

    // ---------------------------------------------------------------------
    // Properties
    // ---------------------------------------------------------------------

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn cancelled_vouchers_leave_no_trace_on_balances(
            vouchers in proptest::collection::vec((1u32..10_000, any::<bool>()), 1..12),
        ) {
            let h = setup();
            let cash = open(&h, "1000", AccountGroup::Assets, dec!(250));
            let sales = open(&h, "4000", AccountGroup::Income, Decimal::ZERO);

            let mut kept = Decimal::ZERO;
            for (cents, cancel) in vouchers {
                let amount = Decimal::new(cents as i64, 2);
                let v = h
                    .vouchers
                    .create_voucher(h.tenant, sale(&h, today(), cash, sales, amount, true))
                    .unwrap();
                if cancel {
                    h.vouchers.cancel_voucher(h.tenant, v.id(), "void", h.user).unwrap();
                } else {
                    kept += amount;
                }
            }

            prop_assert_eq!(balance(&h, cash), dec!(250) + kept);
            prop_assert_eq!(balance(&h, sales), kept);
            let ledger = h
                .vouchers
                .account_ledger(h.tenant, cash, DateRange::all(), None, None)
                .unwrap();
            prop_assert_eq!(ledger.closing_balance, balance(&h, cash));
            prop_assert_eq!(ledger.total_debit, kept);
        }

        #[test]
        fn stock_never_goes_negative(
            moves in proptest::collection::vec((1u32..50, any::<bool>()), 1..20),
        ) {
            let h = setup();
            let salt = item(&h, "SALT", ValuationMethod::WeightedAverage);

            let mut expected = Decimal::ZERO;
            for (qty, inward) in moves {
                let qty = Decimal::from(qty);
                let kind = if inward { MovementType::AdjustmentIn } else { MovementType::AdjustmentOut };
                let result = h.stock.create_movement(h.tenant, movement(&h, salt, kind, qty, dec!(1)));
                match (inward, result) {
                    (true, Ok(_)) => expected += qty,
                    (false, Ok(_)) => expected -= qty,
                    (false, Err(e)) => {
                        prop_assert!(qty > expected);
                        prop_assert_eq!(e.category(), ErrorCategory::ResourceInsufficiency);
                    }
                    (true, Err(e)) => prop_assert!(false, "inward movement failed: {e}"),
                }
                prop_assert!(stock_of(&h, salt) >= Decimal::ZERO);
                prop_assert_eq!(stock_of(&h, salt), expected);
            }
        }
    }
}
