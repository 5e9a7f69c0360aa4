//! The ordered response policy. One rule fires per turn; evaluation walks
//! [`IntentCategory::PRIORITY`] and the first matching rule decides the
//! reply. Only the phone-capture rule carries a side-effect payload.

use std::collections::BTreeSet;

use rust_decimal::Decimal;

use mercabot_core::{
    BulkDiscountCalculator, Direction, IntentCategory, Message, PricedQuote, Product, ProductKey,
    QuoteCalculator,
};

use crate::context::{BotTopic, ConversationContext};
use crate::signals;

/// Everything the engine reads for one turn. The window is newest first,
/// the catalog is sellable products ordered by display name.
#[derive(Clone, Copy, Debug)]
pub struct TurnInput<'a> {
    pub text: &'a str,
    pub window: &'a [Message],
    pub catalog: &'a [Product],
}

/// Contact details extracted this turn, with interest aggregated across the
/// whole window plus the current message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedLead {
    pub phone: String,
    pub product_keys: BTreeSet<ProductKey>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    pub reply: String,
    pub intent: IntentCategory,
    pub captured: Option<CapturedLead>,
}

pub struct PolicyEngine {
    calculator: Box<dyn QuoteCalculator>,
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self { calculator: Box::new(BulkDiscountCalculator) }
    }
}

impl PolicyEngine {
    pub fn new(calculator: Box<dyn QuoteCalculator>) -> Self {
        Self { calculator }
    }

    pub fn decide(&self, input: &TurnInput<'_>, context: &ConversationContext) -> Decision {
        let phone = signals::detect_phone(input.text);
        let quantity = signals::detect_quantity(input.text);

        for intent in IntentCategory::PRIORITY {
            let outcome = match intent {
                IntentCategory::PhoneCapture => self.phone_capture(input, phone.as_deref()),
                IntentCategory::Negotiation => self.negotiation(input, context, quantity),
                IntentCategory::DeliveryInquiry => fixed_reply(
                    input.text,
                    &signals::DELIVERY_KEYWORDS,
                    "si, pero la entrega no incluye el precio, usted tendria que pagar por el \
                     delivery, o caso contrario podria recogerlo del almacen",
                ),
                IntentCategory::PickupConfirmation => fixed_reply(
                    input.text,
                    &signals::PICKUP_KEYWORDS,
                    "ok, mandeme su numero para que le mande ubicacion",
                ),
                IntentCategory::PhoneRequest => fixed_reply(
                    input.text,
                    &signals::PHONE_REQUEST_KEYWORDS,
                    "mejor mandeme asi yo puedo mandarle el mensajito, y coordinamos por whatsap",
                ),
                IntentCategory::Confirmation => self.confirmation(input, context, quantity),
                IntentCategory::Thanks => fixed_reply(
                    input.text,
                    &signals::THANKS_KEYWORDS,
                    "De nada! ¿Le interesa algún producto?",
                ),
                IntentCategory::Goodbye => fixed_reply(
                    input.text,
                    &signals::GOODBYE_KEYWORDS,
                    "¡Hasta luego! Cualquier cosa me escribe",
                ),
                IntentCategory::QuantityFollowUp => self.quantity_follow_up(context, quantity),
                IntentCategory::PriceInquiry => self.price_inquiry(input, context),
                IntentCategory::DirectProductMention => {
                    signals::detect_product(input.text, input.catalog)
                        .map(|product| format!("Sí, tenemos a {}bs", amount(product.unit_price)))
                }
                IntentCategory::Greeting => fixed_reply(
                    input.text,
                    &signals::GREETING_KEYWORDS,
                    "Hola, ¿en qué te puedo ayudar?",
                ),
                IntentCategory::GeneralInterest => self.general_interest(input),
                IntentCategory::Fallback => Some(self.fallback(input)),
            };

            if let Some(reply) = outcome {
                let captured = (intent == IntentCategory::PhoneCapture)
                    .then(|| self.aggregate_lead(input, phone.as_deref()))
                    .flatten();
                return Decision { reply, intent, captured };
            }
        }

        // PRIORITY ends in Fallback, which always yields a reply.
        Decision {
            reply: self.fallback(input),
            intent: IntentCategory::Fallback,
            captured: None,
        }
    }

    fn phone_capture(&self, _input: &TurnInput<'_>, phone: Option<&str>) -> Option<String> {
        phone.map(|_| "te escribo".to_string())
    }

    fn aggregate_lead(&self, input: &TurnInput<'_>, phone: Option<&str>) -> Option<CapturedLead> {
        let phone = phone?;

        let mut product_keys: BTreeSet<ProductKey> = input
            .window
            .iter()
            .filter(|message| message.direction == Direction::Inbound)
            .filter_map(|message| signals::detect_product(&message.text, input.catalog))
            .map(|product| product.key.clone())
            .collect();
        if let Some(product) = signals::detect_product(input.text, input.catalog) {
            product_keys.insert(product.key.clone());
        }

        Some(CapturedLead { phone: phone.to_string(), product_keys })
    }

    fn negotiation(
        &self,
        input: &TurnInput<'_>,
        context: &ConversationContext,
        quantity: Option<u32>,
    ) -> Option<String> {
        if !signals::contains_any(input.text, &signals::NEGOTIATION_KEYWORDS) {
            return None;
        }

        let Some(product) = &context.last_product else {
            return Some(self.discount_tiers_summary(input.catalog));
        };

        if let Some(quantity) = quantity {
            let quote = self.quote(quantity, product);
            if quote.discount_applied {
                return Some(format!(
                    "Nada menos, pero si lleva {} le hago {}% descuento = {}bs con envío gratis \
                     hasta el cuarto anillo",
                    quantity,
                    quote.discount_percent,
                    amount(quote.total)
                ));
            }
            return Some(format!(
                "Nada menos, {} unidades = {}bs con envío gratis hasta el cuarto anillo",
                quantity,
                amount(quote.total)
            ));
        }

        match &product.discount {
            Some(policy) => {
                let quote = self.quote(policy.min_quantity, product);
                Some(format!(
                    "Nada menos, pero si lleva {} le hago descuento de {}bs = {}bs",
                    policy.min_quantity,
                    amount(quote.discount_amount),
                    amount(quote.total)
                ))
            }
            None => Some(format!(
                "Nada menos, {}bs es el precio final",
                amount(product.unit_price)
            )),
        }
    }

    /// Generic discount explanation when negotiation arrives with no product
    /// context: describe the first discounted product's qualifying tier.
    fn discount_tiers_summary(&self, catalog: &[Product]) -> String {
        let discounted = catalog
            .iter()
            .filter(|product| product.sellable())
            .find_map(|product| product.discount.as_ref().map(|policy| (product, policy)));

        match discounted {
            Some((product, policy)) => {
                let quote = self.quote(policy.min_quantity, product);
                format!(
                    "Nada menos, los descuentos se aplican a partir de:\n{} {} a {}bs = descuento \
                     de {}bs",
                    policy.min_quantity,
                    product.name.to_lowercase(),
                    amount(quote.total),
                    amount(quote.discount_amount)
                )
            }
            None => "Nada menos, ese ya es el precio final".to_string(),
        }
    }

    fn confirmation(
        &self,
        input: &TurnInput<'_>,
        context: &ConversationContext,
        quantity: Option<u32>,
    ) -> Option<String> {
        if !signals::contains_any(input.text, &signals::CONFIRMATION_KEYWORDS) {
            return None;
        }

        match context.last_bot_topic() {
            // "ok" with a quantity attached belongs to the quantity rule
            BotTopic::DiscountOrPrice if quantity.is_none() => {
                Some("va querer 1 o 3?".to_string())
            }
            BotTopic::Delivery => Some("esta bien, mandeme su telefono".to_string()),
            BotTopic::Other if quantity.is_none() => Some("¿Cuántos quiere?".to_string()),
            _ => None,
        }
    }

    fn quantity_follow_up(
        &self,
        context: &ConversationContext,
        quantity: Option<u32>,
    ) -> Option<String> {
        let quantity = quantity?;

        let Some(product) = &context.last_product else {
            return Some("Ok. Deme su teléfono para coordinar".to_string());
        };

        if quantity == 1 {
            return Some(
                "esta bien, si gusta puedo hacerle el envio o puede pasar a recogerlo".to_string(),
            );
        }

        let quote = self.quote(quantity, product);
        let name = product.name.to_lowercase();

        if quote.discount_applied {
            return Some(format!(
                "ok si quiere {} te hago un descuento de {}bs, {} {} en {}bs",
                quantity,
                amount(quote.discount_amount),
                quantity,
                name,
                amount(quote.total)
            ));
        }

        match &product.discount {
            Some(policy) => Some(format!(
                "Ok, {} {} en {}bs, se aplica descuento a partir de {} unidades. Deme su teléfono",
                quantity,
                name,
                amount(quote.total),
                policy.min_quantity
            )),
            None => Some(format!(
                "Ok, {} {} en {}bs. Deme su teléfono",
                quantity,
                name,
                amount(quote.total)
            )),
        }
    }

    fn price_inquiry(&self, input: &TurnInput<'_>, context: &ConversationContext) -> Option<String> {
        if !signals::contains_any(input.text, &signals::PRICE_KEYWORDS) {
            return None;
        }

        if let Some(product) = signals::detect_product(input.text, input.catalog) {
            return Some(format!("{} bs", amount(product.unit_price)));
        }

        if let Some(product) = &context.last_product {
            return Some(format!("{} bs", amount(product.unit_price)));
        }

        let listing = price_listing(input.catalog);
        if listing.is_empty() {
            Some("No tengo productos disponibles en este momento".to_string())
        } else {
            Some(listing)
        }
    }

    fn general_interest(&self, input: &TurnInput<'_>) -> Option<String> {
        if !signals::contains_any(input.text, &signals::INTEREST_KEYWORDS) {
            return None;
        }

        let listing = offer_listing(input.catalog);
        if listing.is_empty() {
            Some("Disculpe, no tengo productos disponibles en este momento".to_string())
        } else {
            Some(format!("Perfecto! Tengo {listing}. ¿Qué le interesa?"))
        }
    }

    fn fallback(&self, input: &TurnInput<'_>) -> String {
        let listing = offer_listing(input.catalog);
        if listing.is_empty() {
            "Hola, estoy actualizando mi inventario. Pronto tendré productos disponibles"
                .to_string()
        } else {
            format!("¿En qué le puedo ayudar? Tengo {listing} de excelente calidad")
        }
    }

    fn quote(&self, quantity: u32, product: &Product) -> PricedQuote {
        self.calculator.price(quantity, product.unit_price, product.discount.as_ref())
    }
}

fn fixed_reply(text: &str, keywords: &[&str], reply: &str) -> Option<String> {
    signals::contains_any(text, keywords).then(|| reply.to_string())
}

/// Whole-currency amounts render without trailing zeros ("95", not "95.00").
fn amount(value: Decimal) -> String {
    value.normalize().to_string()
}

fn offer_listing(catalog: &[Product]) -> String {
    catalog
        .iter()
        .filter(|product| product.sellable())
        .map(|product| format!("{} ({}bs)", product.name, amount(product.unit_price)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn price_listing(catalog: &[Product]) -> String {
    catalog
        .iter()
        .filter(|product| product.sellable())
        .map(|product| format!("{}: {}bs", product.name, amount(product.unit_price)))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use mercabot_core::{
        Direction, DiscountPolicy, IntentCategory, Message, Product, ProductKey, UserId,
    };

    use crate::context::ConversationContext;

    use super::{Decision, PolicyEngine, TurnInput};

    fn message(text: &str, direction: Direction) -> Message {
        Message {
            user_id: UserId("user-1".to_string()),
            text: text.to_string(),
            direction,
            timestamp: Utc::now(),
        }
    }

    fn catalog() -> Vec<Product> {
        vec![
            Product {
                key: ProductKey("platos".to_string()),
                name: "Platos".to_string(),
                unit_price: Decimal::from(20),
                stock: 15,
                keywords: vec!["plato".to_string(), "platos".to_string()],
                active: true,
                discount: None,
            },
            Product {
                key: ProductKey("tappers".to_string()),
                name: "Tappers".to_string(),
                unit_price: Decimal::from(35),
                stock: 10,
                keywords: vec!["tapper".to_string(), "tappers".to_string()],
                active: true,
                discount: Some(DiscountPolicy {
                    min_quantity: 3,
                    percent_tiers: BTreeMap::from([(3, 10)]),
                    fixed_totals: BTreeMap::from([(3, Decimal::from(95))]),
                }),
            },
            Product {
                key: ProductKey("vasos".to_string()),
                name: "Vasos".to_string(),
                unit_price: Decimal::from(12),
                stock: 8,
                keywords: vec!["vaso".to_string(), "vasos".to_string()],
                active: true,
                discount: None,
            },
        ]
    }

    fn decide(text: &str, window: Vec<Message>) -> Decision {
        let catalog = catalog();
        let context = ConversationContext::resolve(&window, &catalog);
        let input = TurnInput { text, window: &window, catalog: &catalog };
        PolicyEngine::default().decide(&input, &context)
    }

    #[test]
    fn direct_product_mention_confirms_with_price() {
        let decision = decide("tienen tappers?", vec![]);

        assert_eq!(decision.intent, IntentCategory::DirectProductMention);
        assert_eq!(decision.reply, "Sí, tenemos a 35bs");
        assert!(decision.captured.is_none());
    }

    #[test]
    fn product_mention_is_case_insensitive() {
        let decision = decide("TAPPERS??", vec![]);
        assert_eq!(decision.intent, IntentCategory::DirectProductMention);
    }

    #[test]
    fn price_inquiry_without_context_lists_every_price() {
        let decision = decide("cuanto cuesta?", vec![]);

        assert_eq!(decision.intent, IntentCategory::PriceInquiry);
        assert_eq!(decision.reply, "Platos: 20bs, Tappers: 35bs, Vasos: 12bs");
    }

    #[test]
    fn price_inquiry_uses_last_mentioned_product() {
        let window = vec![
            message("Sí, tenemos a 35bs", Direction::Outbound),
            message("tienen tappers?", Direction::Inbound),
        ];
        let decision = decide("y cuanto esta?", window);

        assert_eq!(decision.intent, IntentCategory::PriceInquiry);
        assert_eq!(decision.reply, "35 bs");
    }

    #[test]
    fn quantity_with_product_context_quotes_discounted_total() {
        let window = vec![
            message("Sí, tenemos a 35bs", Direction::Outbound),
            message("tienen tappers?", Direction::Inbound),
        ];
        let decision = decide("quiero 3", window);

        assert_eq!(decision.intent, IntentCategory::QuantityFollowUp);
        assert!(decision.reply.contains("95"), "reply should quote 95bs: {}", decision.reply);
        assert!(decision.reply.contains("10"), "reply should name the 10bs discount");
    }

    #[test]
    fn quantity_below_threshold_mentions_the_threshold() {
        let window = vec![message("tienen tappers?", Direction::Inbound)];
        let decision = decide("quiero 2", window);

        assert_eq!(decision.intent, IntentCategory::QuantityFollowUp);
        assert!(decision.reply.contains("70"));
        assert!(decision.reply.contains("a partir de 3"));
    }

    #[test]
    fn quantity_one_offers_delivery_or_pickup_without_discount_talk() {
        let window = vec![message("tienen tappers?", Direction::Inbound)];
        let decision = decide("solo uno", window);

        assert_eq!(decision.intent, IntentCategory::QuantityFollowUp);
        assert!(!decision.reply.contains("descuento"));
        assert!(decision.reply.contains("recogerlo"));
    }

    #[test]
    fn quantity_without_product_context_asks_for_phone() {
        let decision = decide("quiero 3", vec![]);

        assert_eq!(decision.intent, IntentCategory::QuantityFollowUp);
        assert_eq!(decision.reply, "Ok. Deme su teléfono para coordinar");
    }

    #[test]
    fn phone_number_captures_lead_with_aggregated_products() {
        let window = vec![
            message("y los vasos?", Direction::Inbound),
            message("Sí, tenemos a 35bs", Direction::Outbound),
            message("tienen tappers?", Direction::Inbound),
        ];
        let decision = decide("mi numero es 70012345", window);

        assert_eq!(decision.intent, IntentCategory::PhoneCapture);
        assert_eq!(decision.reply, "te escribo");

        let captured = decision.captured.as_ref();
        assert_eq!(captured.map(|lead| lead.phone.as_str()), Some("70012345"));
        let keys: Vec<&str> = captured
            .map(|lead| lead.product_keys.iter().map(|key| key.0.as_str()).collect())
            .unwrap_or_default();
        assert_eq!(keys, vec!["tappers", "vasos"]);
    }

    #[test]
    fn phone_beats_negotiation_keywords() {
        let decision = decide("no hay descuento? mi cel 70012345", vec![]);

        assert_eq!(decision.intent, IntentCategory::PhoneCapture);
        assert!(decision.captured.is_some());
        assert!(!decision.reply.contains("bs"), "acknowledgement carries no price content");
    }

    #[test]
    fn negotiation_with_product_and_quantity_quotes_percent() {
        let window = vec![message("tienen tappers?", Direction::Inbound)];
        let decision = decide("nada menos? quiero 5", window);

        assert_eq!(decision.intent, IntentCategory::Negotiation);
        assert!(decision.reply.contains("10% descuento"));
        assert!(decision.reply.contains("157bs"));
    }

    #[test]
    fn negotiation_with_product_offers_best_value_quantity() {
        let window = vec![message("tienen tappers?", Direction::Inbound)];
        let decision = decide("nada menos?", window);

        assert_eq!(decision.intent, IntentCategory::Negotiation);
        assert_eq!(
            decision.reply,
            "Nada menos, pero si lleva 3 le hago descuento de 10bs = 95bs"
        );
    }

    #[test]
    fn negotiation_without_context_explains_tiers() {
        let decision = decide("hay descuento?", vec![]);

        assert_eq!(decision.intent, IntentCategory::Negotiation);
        assert!(decision.reply.contains("los descuentos se aplican a partir de"));
        assert!(decision.reply.contains("3 tappers a 95bs"));
    }

    #[test]
    fn confirmation_after_price_talk_asks_how_many() {
        let window = vec![message("3 tappers = 95bs con descuento", Direction::Outbound)];
        let decision = decide("ok", window);

        assert_eq!(decision.intent, IntentCategory::Confirmation);
        assert_eq!(decision.reply, "va querer 1 o 3?");
    }

    #[test]
    fn confirmation_after_delivery_talk_asks_for_phone() {
        let window = vec![message("puedo hacerle el envio", Direction::Outbound)];
        let decision = decide("dale", window);

        assert_eq!(decision.intent, IntentCategory::Confirmation);
        assert_eq!(decision.reply, "esta bien, mandeme su telefono");
    }

    #[test]
    fn confirmation_with_quantity_defers_to_quantity_rule() {
        let window = vec![
            message("3 tappers = 95bs con descuento", Direction::Outbound),
            message("tienen tappers?", Direction::Inbound),
        ];
        let decision = decide("ok quiero 3", window);

        assert_eq!(decision.intent, IntentCategory::QuantityFollowUp);
        assert!(decision.reply.contains("95"));
    }

    #[test]
    fn delivery_inquiry_gets_fixed_conditions() {
        let decision = decide("hacen delivery?", vec![]);

        assert_eq!(decision.intent, IntentCategory::DeliveryInquiry);
        assert!(decision.reply.contains("la entrega no incluye el precio"));
    }

    #[test]
    fn pickup_confirmation_requests_phone_for_location() {
        let decision = decide("puedo pasar a recoger", vec![]);

        assert_eq!(decision.intent, IntentCategory::PickupConfirmation);
        assert_eq!(decision.reply, "ok, mandeme su numero para que le mande ubicacion");
    }

    #[test]
    fn seller_phone_request_redirects() {
        let decision = decide("mandeme su telefono", vec![]);

        assert_eq!(decision.intent, IntentCategory::PhoneRequest);
        assert!(decision.reply.contains("coordinamos por whatsap"));
    }

    #[test]
    fn greeting_and_farewell_are_fixed() {
        assert_eq!(decide("hola!", vec![]).reply, "Hola, ¿en qué te puedo ayudar?");
        assert_eq!(decide("chau", vec![]).reply, "¡Hasta luego! Cualquier cosa me escribe");
        assert_eq!(decide("muchas gracias", vec![]).reply, "De nada! ¿Le interesa algún producto?");
    }

    #[test]
    fn general_interest_lists_catalog_with_prices() {
        let decision = decide("busco algo para la cocina", vec![]);

        assert_eq!(decision.intent, IntentCategory::GeneralInterest);
        assert_eq!(
            decision.reply,
            "Perfecto! Tengo Platos (20bs), Tappers (35bs), Vasos (12bs). ¿Qué le interesa?"
        );
    }

    #[test]
    fn fallback_lists_catalog() {
        let decision = decide("xyzzy", vec![]);

        assert_eq!(decision.intent, IntentCategory::Fallback);
        assert!(decision.reply.contains("Platos (20bs), Tappers (35bs), Vasos (12bs)"));
    }

    #[test]
    fn fallback_with_empty_catalog_mentions_restock() {
        let context = ConversationContext::resolve(&[], &[]);
        let input = TurnInput { text: "xyzzy", window: &[], catalog: &[] };
        let decision = PolicyEngine::default().decide(&input, &context);

        assert_eq!(
            decision.reply,
            "Hola, estoy actualizando mi inventario. Pronto tendré productos disponibles"
        );
    }
}
