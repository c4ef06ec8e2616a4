use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use switchboard_core::{HandlerResult, Language, Offer, SessionContext};

use super::{Handler, HandlerInput};

struct CatalogItem {
    product: &'static str,
    price_minor: i64,
    features_en: &'static [&'static str],
    features_ar: &'static [&'static str],
}

const CATALOG: &[CatalogItem] = &[
    CatalogItem {
        product: "CRM",
        price_minor: 120_000,
        features_en: &["Contact management", "Sales pipeline", "WhatsApp integration"],
        features_ar: &["إدارة جهات الاتصال", "مسار المبيعات", "تكامل مع واتساب"],
    },
    CatalogItem {
        product: "ERP",
        price_minor: 350_000,
        features_en: &["Inventory", "Accounting", "Purchasing"],
        features_ar: &["إدارة المخزون", "المحاسبة", "المشتريات"],
    },
    CatalogItem {
        product: "POS",
        price_minor: 80_000,
        features_en: &["Cashier app", "Receipt printing", "Daily sales reports"],
        features_ar: &["تطبيق الكاشير", "طباعة الفواتير", "تقارير المبيعات اليومية"],
    },
    CatalogItem {
        product: "Website",
        price_minor: 150_000,
        features_en: &["Responsive design", "Online store", "SEO setup"],
        features_ar: &["تصميم متجاوب", "متجر إلكتروني", "تهيئة محركات البحث"],
    },
    CatalogItem {
        product: "Mobile App",
        price_minor: 400_000,
        features_en: &["iOS and Android builds", "Push notifications", "Admin dashboard"],
        features_ar: &["نسخ iOS و Android", "الإشعارات الفورية", "لوحة تحكم"],
    },
    CatalogItem {
        product: "Chatbot",
        price_minor: 90_000,
        features_en: &["Arabic and English replies", "Lead capture", "Human handover"],
        features_ar: &["ردود بالعربية والإنجليزية", "جمع بيانات العملاء", "تحويل لموظف"],
    },
    CatalogItem {
        product: "WhatsApp Automation",
        price_minor: 60_000,
        features_en: &["Broadcast campaigns", "Auto replies", "Order notifications"],
        features_ar: &["حملات جماعية", "ردود تلقائية", "إشعارات الطلبات"],
    },
];

static DEFAULT_ITEM: CatalogItem = CatalogItem {
    product: "Business Automation Suite",
    price_minor: 200_000,
    features_en: &["CRM", "Appointment booking", "WhatsApp automation"],
    features_ar: &["نظام إدارة العملاء", "حجز المواعيد", "أتمتة واتساب"],
};

pub struct OfferHandler {
    validity_days: i64,
}

impl OfferHandler {
    pub fn new(validity_days: i64) -> Self {
        Self {
            validity_days: validity_days.max(1),
        }
    }
}

fn catalog_item(product: Option<&String>) -> &'static CatalogItem {
    product
        .and_then(|wanted| {
            CATALOG
                .iter()
                .find(|item| item.product.eq_ignore_ascii_case(wanted))
        })
        .unwrap_or(&DEFAULT_ITEM)
}

#[async_trait]
impl Handler for OfferHandler {
    fn name(&self) -> &'static str {
        "offer"
    }

    async fn handle(&self, ctx: &SessionContext, input: &HandlerInput<'_>) -> Result<HandlerResult> {
        let item = catalog_item(input.classification.entity("products").first());
        let price_minor = ctx
            .business
            .price_overrides
            .get(&item.product.to_lowercase())
            .copied()
            .unwrap_or(item.price_minor);
        let features = if ctx.language.base() == Language::Ar {
            item.features_ar
        } else {
            item.features_en
        };

        Ok(HandlerResult::Offer(Offer {
            product: item.product.to_string(),
            price_minor,
            currency: ctx.business.currency.clone(),
            features: features.iter().map(|f| f.to_string()).collect(),
            valid_until: Utc::now().date_naive() + Duration::days(self.validity_days),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tests_support::context;
    use switchboard_core::{ClassificationResult, ClassificationSource, Entities, Intent};

    fn classification(products: &[&str]) -> ClassificationResult {
        let mut entities = Entities::new();
        if !products.is_empty() {
            entities.insert(
                "products".into(),
                products.iter().map(|p| p.to_string()).collect(),
            );
        }
        ClassificationResult::new(Intent::SalesInquiry, 0.8, entities, ClassificationSource::Rules)
    }

    #[tokio::test]
    async fn prices_known_product_in_business_currency() {
        let mut ctx = context(Language::En);
        ctx.business.currency = "SAR".into();
        let classification = classification(&["CRM"]);
        let result = OfferHandler::new(14)
            .handle(&ctx, &HandlerInput { text: "quote for crm", classification: &classification })
            .await
            .unwrap();

        let HandlerResult::Offer(offer) = result else {
            panic!("expected offer");
        };
        assert_eq!(offer.product, "CRM");
        assert_eq!(offer.price_minor, 120_000);
        assert_eq!(offer.currency, "SAR");
        assert_eq!(offer.features.len(), 3);
        assert_eq!(offer.valid_until, Utc::now().date_naive() + Duration::days(14));
    }

    #[tokio::test]
    async fn honours_price_override_and_arabic_features() {
        let mut ctx = context(Language::ArGulf);
        ctx.business.price_overrides.insert("pos".into(), 55_000);
        let classification = classification(&["POS"]);
        let result = OfferHandler::new(7)
            .handle(&ctx, &HandlerInput { text: "بكم نقاط البيع", classification: &classification })
            .await
            .unwrap();

        let HandlerResult::Offer(offer) = result else {
            panic!("expected offer");
        };
        assert_eq!(offer.price_minor, 55_000);
        assert_eq!(offer.features[0], "تطبيق الكاشير");
    }

    #[tokio::test]
    async fn unknown_product_gets_default_bundle() {
        let ctx = context(Language::En);
        let classification = classification(&[]);
        let result = OfferHandler::new(14)
            .handle(&ctx, &HandlerInput { text: "pricing please", classification: &classification })
            .await
            .unwrap();
        assert!(matches!(
            result,
            HandlerResult::Offer(Offer { ref product, .. }) if product == "Business Automation Suite"
        ));
    }
}
