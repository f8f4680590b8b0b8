use moving_quote::adapters::JsonFormAdapter;
use moving_quote::app::modules::ids;
use moving_quote::core::{
    ContextPatch, PriceAdjustment, QuoteContext, QuoteInputAdapter, Scenario, ScenarioCatalog,
};
use moving_quote::{ModuleRegistry, MultiQuoteService, PricingConfig, QuoteError};
use std::sync::Arc;
use std::thread;

const ORDER: &str = r#"{
    "serviceType": "MOVING",
    "pickup": { "address": "12 rue des Lilas", "postalCode": "69003", "floor": 0 },
    "delivery": { "address": "4 avenue Foch", "postalCode": "69006", "floor": 0 },
    "distanceKm": 10,
    "volume": 30,
    "volumeConfidence": "MEDIUM",
    "movingDate": "2026-11-17",
    "referenceDate": "2026-10-16"
}"#;

fn order() -> QuoteContext {
    JsonFormAdapter::new().to_quote_context(ORDER).unwrap()
}

fn service() -> MultiQuoteService {
    MultiQuoteService::with_defaults(&PricingConfig::default()).unwrap()
}

#[test]
fn test_default_scenarios_in_catalog_order() {
    let quotes = service().quote_all(&order()).unwrap();

    let ids: Vec<&str> = quotes.quotes.iter().map(|q| q.scenario_id.as_str()).collect();
    assert_eq!(ids, vec!["ECO", "STANDARD", "CONFORT", "PREMIUM", "FLEX"]);
    assert_eq!(quotes.base_cost, 1002.8);
    assert_eq!(quotes.get("standard").unwrap().final_price, quotes.base_cost);
    assert_eq!(quotes.cheapest().unwrap().scenario_id, "ECO");
}

#[test]
fn test_flex_applies_the_flexible_discount() {
    let quotes = service().quote_all(&order()).unwrap();
    let flex = quotes.get("FLEX").unwrap();

    // 595 labor * 5 % = 29.75 off, then margin on 842.25
    assert!(flex.breakdown.computed.is_activated(ids::FLEXIBLE_DATE_DISCOUNT));
    assert_eq!(flex.final_price, 968.59);
}

#[test]
fn test_premium_bills_every_option() {
    let quotes = service().quote_all(&order()).unwrap();
    let premium = quotes.get("PREMIUM").unwrap();

    let computed = &premium.breakdown.computed;
    assert!(computed.cross_sell_proposals().is_empty());
    for id in [ids::REASSEMBLY, ids::PACKING_SUPPLIES, ids::PACKING_SERVICE] {
        assert!(computed.costs().iter().any(|c| c.module_id == id), "{}", id);
    }
    assert!(premium.final_price > quotes.get("CONFORT").unwrap().final_price);
}

#[test]
fn test_scenario_runs_do_not_leak_into_each_other() {
    let service = service();
    let ctx = order();

    let before = service.quote_all(&ctx).unwrap();
    let _ = service.quote_scenario(&ctx, "PREMIUM").unwrap();
    let after = service.quote_all(&ctx).unwrap();

    assert_eq!(before, after);
    assert!(ctx.computed.activated_modules().is_empty());
    assert_eq!(ctx.reassembly, None);
}

#[test]
fn test_custom_catalog() {
    let registry = Arc::new(ModuleRegistry::with_defaults(&PricingConfig::default()).unwrap());
    let catalog = ScenarioCatalog::new(vec![
        Scenario::new("NO_MARGIN", "At cost")
            .disabling(&[ids::COMMERCIAL_MARGIN, ids::MINIMUM_PRICE]),
        Scenario::new("PIANO", "With the piano")
            .forcing(ContextPatch {
                piano: Some(true),
                ..ContextPatch::default()
            })
            .priced(PriceAdjustment {
                flat_amount: 25.0,
                ..PriceAdjustment::default()
            }),
    ])
    .unwrap();
    catalog.validate_against(&registry).unwrap();
    let service = MultiQuoteService::new(registry, catalog);

    let quotes = service.quote_all(&order()).unwrap();
    assert_eq!(quotes.get("NO_MARGIN").unwrap().final_price, 872.0);
    assert_eq!(
        quotes.get("NO_MARGIN").unwrap().breakdown.disabled_modules,
        vec![ids::COMMERCIAL_MARGIN.to_string(), ids::MINIMUM_PRICE.to_string()]
    );

    // fifth mover for the piano: 3.5 h * 5 * 35 = 612.50, plus 180 piano flat
    let piano = quotes.get("PIANO").unwrap();
    assert_eq!(piano.breakdown.subtotal, 1229.92);
    assert_eq!(piano.final_price, 1254.92);
    assert_eq!(piano.breakdown.adjustment_amount, 25.0);
}

#[test]
fn test_unknown_scenario() {
    let err = service().quote_scenario(&order(), "GOLD").unwrap_err();
    assert!(matches!(err, QuoteError::UnknownScenario(ref id) if id == "GOLD"));
}

#[test]
fn test_service_is_shared_across_threads() {
    let service = Arc::new(service());
    let expected = service.quote_all(&order()).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let service = Arc::clone(&service);
            thread::spawn(move || service.quote_all(&order()).unwrap())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}
