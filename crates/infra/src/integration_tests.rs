//! Integration tests for the fulfillment pipeline.
//!
//! Tests: Command → FulfillmentEngine → LedgerStore (unit of work) → EventBus
//!
//! Verifies:
//! - Stock, order items and the fulfillment log move together or not at all
//! - Concurrent deliveries never oversell a part
//! - OR numbers stay unique under concurrent order creation

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::{Arc, mpsc};
    use std::thread;
    use std::time::Duration;

    use chrono::{DateTime, TimeZone, Utc};
    use proptest::prelude::*;

    use warehouse_alerts::{AlertFilter, RaiseStockAlert};
    use warehouse_core::{LedgerError, OrderId, PartId, ProjectId, StockAlertId};
    use warehouse_events::{EventBus, InMemoryEventBus, Notification, Severity, Subscription};
    use warehouse_inventory::{ClassifyPart, Part, RegisterPart, Rotation, StockAdjustment};
    use warehouse_orders::{
        AddItemToOrder, CloseOrder, CreateOrder, OperationType, OrderItem, OrderNumbering,
        RemoveItemFromOrder, RequestedItem,
    };

    use crate::config::LedgerConfig;
    use crate::engine::{FulfillmentEngine, OrderCreated, event_types};
    use crate::store::{InMemoryLedgerStore, LedgerStore, LockScope};

    type Engine = FulfillmentEngine<Arc<InMemoryLedgerStore>, Arc<InMemoryEventBus<Notification>>>;

    fn engine() -> Engine {
        engine_with_store(InMemoryLedgerStore::new())
    }

    fn engine_with_store(store: InMemoryLedgerStore) -> Engine {
        warehouse_observability::init_for_tests();
        FulfillmentEngine::new(
            Arc::new(store),
            Arc::new(InMemoryEventBus::new()),
            OrderNumbering::default(),
        )
    }

    fn march_2024() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn register(engine: &Engine, sku: &str, stock: u32) -> Part {
        engine
            .register_part(RegisterPart {
                part_id: PartId::new(),
                sku: sku.to_string(),
                name: format!("Part {sku}"),
                category: "Equipment".to_string(),
                initial_stock: stock,
                rotation: None,
                days_in_warehouse: None,
                occurred_at: Utc::now(),
            })
            .unwrap()
    }

    fn create_order(engine: &Engine, items: Vec<RequestedItem>) -> Result<OrderCreated, LedgerError> {
        engine.create_order(CreateOrder {
            order_id: OrderId::new(),
            technician: "Juan Perez".to_string(),
            department: "HVAC".to_string(),
            supplier_name: None,
            project_id: ProjectId::new(),
            items,
            occurred_at: march_2024(),
        })
    }

    fn empty_order(engine: &Engine) -> OrderId {
        create_order(engine, vec![]).unwrap().order.id_typed()
    }

    fn add(engine: &Engine, order_id: OrderId, part_id: PartId, quantity: u32) -> Result<OrderItem, LedgerError> {
        engine.add_item_to_order(AddItemToOrder {
            order_id,
            part_id,
            quantity,
            actor: "almacen".to_string(),
            notes: None,
            occurred_at: Utc::now(),
        })
    }

    fn remove(
        engine: &Engine,
        order_id: OrderId,
        part_id: PartId,
        quantity: u32,
    ) -> Result<Option<OrderItem>, LedgerError> {
        engine.remove_item_from_order(RemoveItemFromOrder {
            order_id,
            part_id,
            quantity,
            actor: "almacen".to_string(),
            notes: Some("returned unused".to_string()),
            occurred_at: Utc::now(),
        })
    }

    fn stock_of(engine: &Engine, part_id: PartId) -> u32 {
        engine.part(part_id).unwrap().stock()
    }

    #[test]
    fn delivery_from_empty_stock_is_rejected_without_writes() {
        let engine = engine();
        let compressor = register(&engine, "EQUI-022", 0);
        let order_id = empty_order(&engine);

        let err = add(&engine, order_id, compressor.id_typed(), 1).unwrap_err();

        assert_eq!(
            err,
            LedgerError::InsufficientStock {
                part_id: compressor.id_typed(),
                requested: 1,
                available: 0,
            }
        );
        assert_eq!(stock_of(&engine, compressor.id_typed()), 0);
        assert!(engine.order_items(order_id).unwrap().is_empty());
        assert!(engine.fulfillment_logs(order_id).unwrap().is_empty());
        // Deliveries never raise alerts on their own.
        assert!(engine.stock_alerts(AlertFilter::All).unwrap().is_empty());
    }

    #[test]
    fn add_then_remove_restores_stock_and_keeps_history() {
        let engine = engine();
        let drill = register(&engine, "TOOL-010", 10);
        let order_id = empty_order(&engine);

        let item = add(&engine, order_id, drill.id_typed(), 3).unwrap();
        assert_eq!(stock_of(&engine, drill.id_typed()), 7);
        assert_eq!((item.quantity_required(), item.quantity_fulfilled()), (3, 3));
        assert_eq!(engine.fulfillment_logs(order_id).unwrap().len(), 1);

        let remaining = remove(&engine, order_id, drill.id_typed(), 3).unwrap();
        assert_eq!(remaining, None);
        assert_eq!(stock_of(&engine, drill.id_typed()), 10);
        assert!(engine.order_items(order_id).unwrap().is_empty());

        let logs = engine.fulfillment_logs(order_id).unwrap();
        let signed: Vec<i64> = logs.iter().map(|l| l.quantity()).collect();
        assert_eq!(signed, vec![3, -3]);
        assert_eq!(logs[1].operation_type(), OperationType::Remove);
        assert_eq!(logs[1].notes(), Some("returned unused"));
        assert!(engine.reconcile_order(order_id).unwrap().is_consistent());
    }

    #[test]
    fn partial_return_keeps_the_line() {
        let engine = engine();
        let gloves = register(&engine, "SAFE-001", 20);
        let order_id = empty_order(&engine);

        add(&engine, order_id, gloves.id_typed(), 5).unwrap();
        add(&engine, order_id, gloves.id_typed(), 2).unwrap();
        let remaining = remove(&engine, order_id, gloves.id_typed(), 4).unwrap().unwrap();

        assert_eq!(remaining.quantity_required(), 3);
        assert_eq!(remaining.quantity_fulfilled(), 3);
        assert_eq!(stock_of(&engine, gloves.id_typed()), 17);
        assert!(engine.reconcile_order(order_id).unwrap().is_consistent());
    }

    #[test]
    fn over_removal_is_rejected_without_writes() {
        let engine = engine();
        let part = register(&engine, "TOOL-020", 5);
        let order_id = empty_order(&engine);

        let err = remove(&engine, order_id, part.id_typed(), 1).unwrap_err();
        assert_eq!(
            err,
            LedgerError::OverRemoval {
                part_id: part.id_typed(),
                requested: 1,
                fulfilled: 0,
            }
        );

        add(&engine, order_id, part.id_typed(), 2).unwrap();
        let err = remove(&engine, order_id, part.id_typed(), 3).unwrap_err();
        assert!(matches!(err, LedgerError::OverRemoval { fulfilled: 2, .. }));
        assert_eq!(stock_of(&engine, part.id_typed()), 3);
        assert_eq!(engine.fulfillment_logs(order_id).unwrap().len(), 1);
    }

    #[test]
    fn zero_quantity_is_a_validation_error() {
        let engine = engine();
        let part = register(&engine, "TOOL-030", 5);
        let order_id = empty_order(&engine);

        assert!(matches!(
            add(&engine, order_id, part.id_typed(), 0),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            remove(&engine, order_id, part.id_typed(), 0),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn unknown_references_are_reported() {
        let engine = engine();
        let part = register(&engine, "TOOL-040", 5);
        let order_id = empty_order(&engine);
        let ghost_order = OrderId::new();
        let ghost_part = PartId::new();

        assert_eq!(
            add(&engine, ghost_order, part.id_typed(), 1).unwrap_err(),
            LedgerError::OrderNotFound(ghost_order)
        );
        assert_eq!(
            add(&engine, order_id, ghost_part, 1).unwrap_err(),
            LedgerError::PartNotFound(ghost_part)
        );
        assert!(matches!(engine.order(ghost_order), Err(LedgerError::NotFound { .. })));
    }

    #[test]
    fn sequential_orders_get_sequential_numbers() {
        let engine = engine();

        let first = create_order(&engine, vec![]).unwrap();
        let second = create_order(&engine, vec![]).unwrap();
        assert_eq!(first.order.or_number().as_str(), "OR-2024-001");
        assert_eq!(second.order.or_number().as_str(), "OR-2024-002");

        let next_year = engine
            .create_order(CreateOrder {
                order_id: OrderId::new(),
                technician: "Ana Ruiz".to_string(),
                department: "Electrical".to_string(),
                supplier_name: Some("Acme".to_string()),
                project_id: ProjectId::new(),
                items: vec![],
                occurred_at: Utc.with_ymd_and_hms(2025, 1, 2, 8, 0, 0).unwrap(),
            })
            .unwrap();
        assert_eq!(next_year.order.or_number().as_str(), "OR-2025-001");
        assert_eq!(next_year.order.supplier_name(), Some("Acme"));
    }

    #[test]
    fn failed_creation_does_not_consume_a_number() {
        let engine = engine();
        let ghost = PartId::new();

        let err = create_order(
            &engine,
            vec![RequestedItem {
                part_id: ghost,
                quantity: 1,
            }],
        )
        .unwrap_err();
        assert_eq!(err, LedgerError::PartNotFound(ghost));
        assert!(engine.orders().unwrap().is_empty());

        let created = create_order(&engine, vec![]).unwrap();
        assert_eq!(created.order.or_number().as_str(), "OR-2024-001");
    }

    #[test]
    fn creation_raises_alerts_for_short_lines_and_delivers_the_rest() {
        let engine = engine();
        let filter = register(&engine, "HVAC-101", 5);
        let compressor = register(&engine, "EQUI-022", 0);

        let created = create_order(
            &engine,
            vec![
                RequestedItem {
                    part_id: filter.id_typed(),
                    quantity: 2,
                },
                RequestedItem {
                    part_id: compressor.id_typed(),
                    quantity: 1,
                },
            ],
        )
        .unwrap();

        assert_eq!(created.items.len(), 1);
        assert_eq!(created.items[0].part_id(), filter.id_typed());
        assert_eq!(stock_of(&engine, filter.id_typed()), 3);
        assert_eq!(stock_of(&engine, compressor.id_typed()), 0);

        assert_eq!(created.alerts.len(), 1);
        let alert = &created.alerts[0];
        assert_eq!(alert.sku(), "EQUI-022");
        assert_eq!(alert.part_name(), "Part EQUI-022");
        assert_eq!(alert.requested_quantity(), 1);
        assert_eq!(alert.or_number(), created.order.or_number());
        assert_eq!(alert.technician(), "Juan Perez");

        let unresolved = engine.stock_alerts(AlertFilter::Unresolved).unwrap();
        assert_eq!(unresolved.len(), 1);
    }

    #[test]
    fn closed_orders_reject_mutation() {
        let engine = engine();
        let part = register(&engine, "TOOL-050", 5);
        let order_id = empty_order(&engine);
        add(&engine, order_id, part.id_typed(), 1).unwrap();

        let close = CloseOrder {
            order_id,
            occurred_at: Utc::now(),
        };
        let closed = engine.close_order(close.clone()).unwrap();
        assert!(!closed.is_open());

        assert!(matches!(
            engine.close_order(close),
            Err(LedgerError::InvalidTransition(_))
        ));
        assert_eq!(
            add(&engine, order_id, part.id_typed(), 1).unwrap_err(),
            LedgerError::OrderClosed(order_id)
        );
        assert_eq!(
            remove(&engine, order_id, part.id_typed(), 1).unwrap_err(),
            LedgerError::OrderClosed(order_id)
        );
        assert_eq!(stock_of(&engine, part.id_typed()), 4);
    }

    #[test]
    fn order_lookup_by_number_is_case_insensitive() {
        let engine = engine();
        let created = create_order(&engine, vec![]).unwrap();

        let found = engine.find_order_by_number(" or-2024-001 ").unwrap();
        assert_eq!(found.map(|o| o.id_typed()), Some(created.order.id_typed()));
        assert_eq!(engine.find_order_by_number("OR-1999-001").unwrap(), None);
    }

    #[test]
    fn orders_are_listed_newest_first() {
        let engine = engine();
        create_order(&engine, vec![]).unwrap();
        create_order(&engine, vec![]).unwrap();

        let numbers: Vec<String> = engine
            .orders()
            .unwrap()
            .iter()
            .map(|o| o.or_number().to_string())
            .collect();
        assert_eq!(numbers, vec!["OR-2024-002", "OR-2024-001"]);
    }

    #[test]
    fn alert_resolution_is_idempotent_and_clearable() {
        let engine = engine();
        let part = register(&engine, "EQUI-030", 0);
        let alert = engine
            .raise_stock_alert(RaiseStockAlert {
                alert_id: StockAlertId::new(),
                part_id: part.id_typed(),
                part_name: part.name().to_string(),
                sku: part.sku().to_string(),
                requested_quantity: 2,
                or_number: "OR-2024-007".to_string(),
                technician: "Juan Perez".to_string(),
                occurred_at: Utc::now(),
            })
            .unwrap();

        let subscription: Subscription<Notification> = engine.bus().subscribe();
        let first_at = Utc::now();
        let first = engine.resolve_stock_alert(alert.id_typed(), first_at).unwrap();
        let second = engine
            .resolve_stock_alert(alert.id_typed(), first_at + chrono::Duration::minutes(1))
            .unwrap();
        assert!(first.is_resolved());
        assert_eq!(second.resolved_at(), Some(first_at));
        // Only the resolution that changed something is announced.
        let resolved = subscription
            .drain()
            .into_iter()
            .filter(|n| n.event_type == event_types::ALERT_RESOLVED)
            .count();
        assert_eq!(resolved, 1);
        assert!(engine.stock_alerts(AlertFilter::Unresolved).unwrap().is_empty());
        assert_eq!(engine.stock_alerts(AlertFilter::All).unwrap().len(), 1);

        let cleared_at = first_at + chrono::Duration::hours(1);
        assert_eq!(engine.clear_resolved_alerts(cleared_at).unwrap(), 1);
        assert!(engine.stock_alerts(AlertFilter::All).unwrap().is_empty());
        assert_eq!(engine.clear_resolved_alerts(cleared_at).unwrap(), 0);

        let cleared = subscription
            .drain()
            .into_iter()
            .filter(|n| n.event_type == event_types::ALERTS_CLEARED)
            .collect::<Vec<_>>();
        assert_eq!(cleared.len(), 2);
        assert!(cleared.iter().all(|n| n.occurred_at == cleared_at));

        assert!(matches!(
            engine.resolve_stock_alert(StockAlertId::new(), Utc::now()),
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[test]
    fn alerts_are_listed_newest_first() {
        let engine = engine();
        let part = register(&engine, "EQUI-031", 0);
        let raise = |minutes: i64| {
            engine
                .raise_stock_alert(RaiseStockAlert {
                    alert_id: StockAlertId::new(),
                    part_id: part.id_typed(),
                    part_name: part.name().to_string(),
                    sku: part.sku().to_string(),
                    requested_quantity: 1,
                    or_number: "OR-2024-008".to_string(),
                    technician: "Juan Perez".to_string(),
                    occurred_at: march_2024() + chrono::Duration::minutes(minutes),
                })
                .unwrap()
                .id_typed()
        };
        // Raised out of time order on purpose.
        let middle = raise(10);
        let oldest = raise(0);
        let newest = raise(20);

        let all: Vec<StockAlertId> = engine
            .stock_alerts(AlertFilter::All)
            .unwrap()
            .iter()
            .map(|a| a.id_typed())
            .collect();
        assert_eq!(all, vec![newest, middle, oldest]);

        engine.resolve_stock_alert(middle, march_2024()).unwrap();
        let unresolved: Vec<StockAlertId> = engine
            .stock_alerts(AlertFilter::Unresolved)
            .unwrap()
            .iter()
            .map(|a| a.id_typed())
            .collect();
        assert_eq!(unresolved, vec![newest, oldest]);
    }

    #[test]
    fn repeated_lines_for_one_part_draw_on_the_same_stock() {
        let engine = engine();
        let filter = register(&engine, "HVAC-102", 5);
        let line = |quantity| RequestedItem {
            part_id: filter.id_typed(),
            quantity,
        };

        let created = create_order(&engine, vec![line(2), line(2)]).unwrap();
        assert_eq!(created.items.len(), 1);
        assert_eq!(created.items[0].quantity_fulfilled(), 4);
        assert!(created.alerts.is_empty());
        assert_eq!(stock_of(&engine, filter.id_typed()), 1);
        assert_eq!(engine.fulfillment_logs(created.order.id_typed()).unwrap().len(), 2);
        assert!(engine.reconcile_order(created.order.id_typed()).unwrap().is_consistent());

        // The second line sees the first line's deduction and falls short.
        let short = create_order(&engine, vec![line(1), line(1)]).unwrap();
        assert_eq!(short.items.len(), 1);
        assert_eq!(short.alerts.len(), 1);
        assert_eq!(stock_of(&engine, filter.id_typed()), 0);
    }

    #[test]
    fn alert_for_unknown_part_is_rejected() {
        let engine = engine();
        let ghost = PartId::new();
        let err = engine
            .raise_stock_alert(RaiseStockAlert {
                alert_id: StockAlertId::new(),
                part_id: ghost,
                part_name: "Ghost".to_string(),
                sku: "GHOST-1".to_string(),
                requested_quantity: 1,
                or_number: "OR-2024-001".to_string(),
                technician: "Juan Perez".to_string(),
                occurred_at: Utc::now(),
            })
            .unwrap_err();
        assert_eq!(err, LedgerError::PartNotFound(ghost));
    }

    #[test]
    fn catalog_rejects_duplicate_sku_case_insensitively() {
        let engine = engine();
        register(&engine, "EQUI-022", 1);

        let err = engine
            .register_part(RegisterPart {
                part_id: PartId::new(),
                sku: "equi-022".to_string(),
                name: "Another compressor".to_string(),
                category: "Equipment".to_string(),
                initial_stock: 3,
                rotation: None,
                days_in_warehouse: None,
                occurred_at: Utc::now(),
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(msg) if msg.contains("EQUI-022")));
        assert_eq!(engine.parts().unwrap().len(), 1);
        assert!(engine.find_part_by_sku("Equi-022").unwrap().is_some());
    }

    #[test]
    fn direct_corrections_floor_at_zero_and_skip_the_log() {
        let engine = engine();
        let part = register(&engine, "TOOL-060", 4);

        let down = engine
            .decrease_stock(StockAdjustment {
                part_id: part.id_typed(),
                quantity: 10,
                occurred_at: Utc::now(),
            })
            .unwrap();
        assert_eq!((down.previous, down.current), (4, 0));

        let up = engine
            .increase_stock(StockAdjustment {
                part_id: part.id_typed(),
                quantity: 6,
                occurred_at: Utc::now(),
            })
            .unwrap();
        assert_eq!(up.current, 6);

        let ghost = PartId::new();
        assert_eq!(
            engine
                .increase_stock(StockAdjustment {
                    part_id: ghost,
                    quantity: 1,
                    occurred_at: Utc::now(),
                })
                .unwrap_err(),
            LedgerError::PartNotFound(ghost)
        );
    }

    #[test]
    fn classification_update_leaves_stock_alone() {
        let engine = engine();
        let part = register(&engine, "TOOL-070", 9);

        let updated = engine
            .update_part_classification(ClassifyPart {
                part_id: part.id_typed(),
                rotation: Some(Rotation::High),
                days_in_warehouse: Some(12),
                occurred_at: Utc::now(),
            })
            .unwrap();
        assert_eq!(updated.rotation(), Some(Rotation::High));
        assert_eq!(updated.days_in_warehouse(), Some(12));
        assert_eq!(updated.stock(), 9);
    }

    #[test]
    fn order_details_bundle_lines_parts_and_logs() {
        let engine = engine();
        let a = register(&engine, "TOOL-080", 10);
        let b = register(&engine, "TOOL-081", 10);
        let order_id = empty_order(&engine);
        add(&engine, order_id, a.id_typed(), 2).unwrap();
        add(&engine, order_id, b.id_typed(), 1).unwrap();
        remove(&engine, order_id, a.id_typed(), 1).unwrap();

        let details = engine.order_details(order_id).unwrap();
        assert_eq!(details.lines.len(), 2);
        assert_eq!(details.logs.len(), 3);
        assert_eq!(details.total_fulfilled(), 2);
        let line = details.line(a.id_typed()).unwrap();
        assert_eq!(line.part.as_ref().map(|p| p.sku()), Some("TOOL-080"));
        assert!(details.reconciliation().is_consistent());
    }

    #[test]
    fn notifications_follow_outcomes() {
        let engine = engine();
        let subscription: Subscription<Notification> = engine.bus().subscribe();
        let part = register(&engine, "TOOL-090", 1);
        let order_id = empty_order(&engine);

        add(&engine, order_id, part.id_typed(), 1).unwrap();
        add(&engine, order_id, part.id_typed(), 1).unwrap_err();

        let received = subscription.drain();
        let added: Vec<&Notification> = received
            .iter()
            .filter(|n| n.event_type == event_types::ITEM_ADDED)
            .collect();
        assert_eq!(added.len(), 2);
        assert_eq!(added[0].severity, Severity::Success);
        assert_eq!(added[0].order_id, Some(order_id));
        assert_eq!(added[1].severity, Severity::Warning);
        assert!(added[1].message.contains("insufficient stock"));
    }

    #[test]
    fn ledger_works_without_subscribers() {
        let engine = engine();
        let part = register(&engine, "TOOL-091", 2);
        let order_id = empty_order(&engine);
        assert!(add(&engine, order_id, part.id_typed(), 2).is_ok());
        assert_eq!(engine.bus().subscriber_count(), 0);
    }

    #[derive(Debug)]
    struct ClosedBus;

    impl EventBus<Notification> for ClosedBus {
        type Error = &'static str;

        fn publish(&self, _message: Notification) -> Result<(), Self::Error> {
            Err("closed")
        }

        fn subscribe(&self) -> Subscription<Notification> {
            Subscription::new(mpsc::channel().1)
        }
    }

    #[test]
    fn failed_publish_never_undoes_a_commit() {
        warehouse_observability::init_for_tests();
        let engine = FulfillmentEngine::new(
            Arc::new(InMemoryLedgerStore::new()),
            ClosedBus,
            OrderNumbering::default(),
        );
        let part = engine
            .register_part(RegisterPart {
                part_id: PartId::new(),
                sku: "TOOL-092".to_string(),
                name: "Torque wrench".to_string(),
                category: "Tools".to_string(),
                initial_stock: 4,
                rotation: None,
                days_in_warehouse: None,
                occurred_at: march_2024(),
            })
            .unwrap();

        assert_eq!(engine.part(part.id_typed()).unwrap().stock(), 4);
    }

    #[test]
    fn reconciliation_reads_a_consistent_snapshot_under_writes() {
        let engine = engine();
        let part = register(&engine, "HVAC-210", 1_000);
        let order_id = empty_order(&engine);

        thread::scope(|s| {
            s.spawn(|| {
                for _ in 0..500 {
                    add(&engine, order_id, part.id_typed(), 1).unwrap();
                }
            });
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..100 {
                        assert!(engine.reconcile_order(order_id).unwrap().is_consistent());
                        assert!(engine.order_details(order_id).unwrap().reconciliation().is_consistent());
                    }
                });
            }
        });

        let details = engine.order_details(order_id).unwrap();
        assert_eq!(details.total_fulfilled(), 500);
        assert_eq!(details.logs.len(), 500);
    }

    #[test]
    fn concurrent_deliveries_never_oversell() {
        let engine = engine();
        let part = register(&engine, "HVAC-200", 10);
        let order_id = empty_order(&engine);
        let quantity = 3;
        let attempts = 8;

        let results: Vec<Result<OrderItem, LedgerError>> = thread::scope(|s| {
            let handles: Vec<_> = (0..attempts)
                .map(|_| s.spawn(|| add(&engine, order_id, part.id_typed(), quantity)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let successes = results.iter().filter(|r| r.is_ok()).count();
        let shortages = results
            .iter()
            .filter(|r| matches!(r, Err(LedgerError::InsufficientStock { .. })))
            .count();
        assert_eq!(successes, 10 / 3);
        assert_eq!(shortages, attempts - successes);
        assert_eq!(stock_of(&engine, part.id_typed()), 1);

        let items = engine.order_items(order_id).unwrap();
        assert_eq!(items[0].quantity_fulfilled(), 9);
        assert!(engine.reconcile_order(order_id).unwrap().is_consistent());
    }

    #[test]
    fn concurrent_deliveries_across_orders_never_oversell() {
        let engine = engine();
        let part = register(&engine, "HVAC-201", 7);
        let orders: Vec<OrderId> = (0..6).map(|_| empty_order(&engine)).collect();

        let successes = thread::scope(|s| {
            let handles: Vec<_> = orders
                .iter()
                .map(|order_id| s.spawn(|| add(&engine, *order_id, part.id_typed(), 2)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|r| r.is_ok())
                .count()
        });

        assert_eq!(successes, 3);
        assert_eq!(stock_of(&engine, part.id_typed()), 1);
    }

    #[test]
    fn concurrent_creation_yields_unique_sequential_numbers() {
        let engine = engine();
        let count = 16;

        let numbers: Vec<String> = thread::scope(|s| {
            let handles: Vec<_> = (0..count)
                .map(|_| s.spawn(|| create_order(&engine, vec![]).map(|c| c.order.or_number().to_string())))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect()
        });

        let unique: HashSet<&String> = numbers.iter().collect();
        assert_eq!(unique.len(), count);

        let mut sorted = numbers.clone();
        sorted.sort();
        let expected: Vec<String> = (1..=count).map(|n| format!("OR-2024-{n:03}")).collect();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn lock_contention_surfaces_as_retryable_failure() {
        let engine = engine_with_store(InMemoryLedgerStore::with_lock_timeout(Duration::from_millis(30)));
        let part = register(&engine, "TOOL-100", 5);
        let order_id = empty_order(&engine);
        let (held_tx, held_rx) = mpsc::channel();

        thread::scope(|s| {
            s.spawn(|| {
                engine.store().transact(&LockScope::new().part(part.id_typed()), move |_uow| {
                    let _ = held_tx.send(());
                    thread::sleep(Duration::from_millis(300));
                    Ok(())
                })
            });

            held_rx.recv().unwrap();
            let err = add(&engine, order_id, part.id_typed(), 1).unwrap_err();
            assert!(matches!(err, LedgerError::TransientFailure(_)));
            assert!(err.is_retryable());
        });

        // Nothing was written by the timed-out attempt.
        assert_eq!(stock_of(&engine, part.id_typed()), 5);
        assert!(add(&engine, order_id, part.id_typed(), 1).is_ok());
    }

    #[test]
    fn engine_from_config_uses_configured_numbering() {
        warehouse_observability::init_for_tests();
        let config = LedgerConfig::from_json(r#"{ "or_prefix": "WO", "sequence_width": 4 }"#).unwrap();
        let engine = FulfillmentEngine::from_config(&config).unwrap();

        let created = engine
            .create_order(CreateOrder {
                order_id: OrderId::new(),
                technician: "Juan Perez".to_string(),
                department: "HVAC".to_string(),
                supplier_name: None,
                project_id: ProjectId::new(),
                items: vec![],
                occurred_at: march_2024(),
            })
            .unwrap();
        assert_eq!(created.order.or_number().as_str(), "WO-2024-0001");
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: any mix of deliveries and returns conserves units between
        /// the shelf and the order, and the log always reconciles.
        #[test]
        fn stock_and_deliveries_are_conserved(
            initial in 0u32..30,
            ops in prop::collection::vec((any::<bool>(), 1u32..8), 1..25)
        ) {
            let engine = engine();
            let part = register(&engine, "PROP-001", initial);
            let order_id = empty_order(&engine);

            for (is_add, quantity) in ops {
                let _ = if is_add {
                    add(&engine, order_id, part.id_typed(), quantity).map(|_| ())
                } else {
                    remove(&engine, order_id, part.id_typed(), quantity).map(|_| ())
                };

                let delivered: u32 = engine
                    .order_items(order_id)
                    .unwrap()
                    .iter()
                    .map(|i| i.quantity_fulfilled())
                    .sum();
                prop_assert_eq!(stock_of(&engine, part.id_typed()) + delivered, initial);
            }

            prop_assert!(engine.reconcile_order(order_id).unwrap().is_consistent());
        }
    }
}
