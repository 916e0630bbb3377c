// Built-in catalogs, seeded into the backing store on first open.

use super::{CatalogEntry, CatalogKind};

struct BuiltinEntry {
    id: &'static str,
    name: &'static str,
    logo: &'static str,
    web_url: &'static str,
    ios_scheme: &'static str,
    android_scheme: &'static str,
    ios_store: &'static str,
    android_store: &'static str,
}

const PAYMENT_APPS: &[BuiltinEntry] = &[
    BuiltinEntry {
        id: "1",
        name: "PayPay",
        logo: "/images/paypay_logo.png",
        web_url: "https://paypay.ne.jp/",
        ios_scheme: "paypay://",
        android_scheme: "paypay://",
        ios_store: "https://apps.apple.com/jp/app/paypay-qr/id1435783608",
        android_store: "https://play.google.com/store/apps/details?id=jp.ne.paypay.android.app",
    },
    BuiltinEntry {
        id: "2",
        name: "LINE Pay",
        logo: "/images/line_pay_logo.png",
        web_url: "https://pay.line.me/",
        ios_scheme: "line://",
        android_scheme: "line://",
        ios_store: "https://apps.apple.com/jp/app/line/id443904275",
        android_store: "https://play.google.com/store/apps/details?id=jp.naver.line.android",
    },
    BuiltinEntry {
        id: "3",
        name: "楽天ペイ",
        logo: "/images/rakuten_pay_logo.png",
        web_url: "https://pay.rakuten.co.jp/",
        ios_scheme: "rakutenpay://",
        android_scheme: "rakutenpay://",
        ios_store: "https://apps.apple.com/jp/app/rakuten-pay/id1139755229",
        android_store: "https://play.google.com/store/apps/details?id=jp.co.rakuten.pay",
    },
    BuiltinEntry {
        id: "4",
        name: "d払い",
        logo: "/images/d_barai_logo.png",
        web_url: "https://d-card.dcard.co.jp/dcard/use/d-barai/",
        ios_scheme: "dpay://",
        android_scheme: "dpay://",
        ios_store: "https://apps.apple.com/jp/app/d払い/id1328132872",
        android_store: "https://play.google.com/store/apps/details?id=com.nttdocomo.dcard.application.dpayment",
    },
    BuiltinEntry {
        id: "5",
        name: "au PAY",
        logo: "/images/au_pay_logo.png",
        web_url: "https://aupay.wallet.auone.jp/",
        ios_scheme: "aupay://",
        android_scheme: "aupay://",
        ios_store: "https://apps.apple.com/jp/app/au-pay/id1118111228",
        android_store: "https://play.google.com/store/apps/details?id=jp.auone.wallet",
    },
    BuiltinEntry {
        id: "6",
        name: "メルペイ",
        logo: "/images/merpay_logo.png",
        web_url: "https://jp.mercari.com/merpay",
        ios_scheme: "mercari://",
        android_scheme: "mercari://",
        ios_store: "https://apps.apple.com/jp/app/mercari/id667861049",
        android_store: "https://play.google.com/store/apps/details?id=com.kouzoh.mercari",
    },
];

const POINT_APPS: &[BuiltinEntry] = &[
    BuiltinEntry {
        id: "1",
        name: "Vポイント",
        logo: "/images/vpoint_logo.png",
        web_url: "https://vpoint.jp/",
        ios_scheme: "vpoint://",
        android_scheme: "vpoint://",
        ios_store: "https://apps.apple.com/jp/app/vpoint/id939540582",
        android_store: "https://play.google.com/store/apps/details?id=jp.co.vpoint.app",
    },
    BuiltinEntry {
        id: "2",
        name: "楽天ポイント",
        logo: "/images/rakuten_point_logo.png",
        web_url: "https://point.rakuten.co.jp/",
        ios_scheme: "rakuten://",
        android_scheme: "rakuten://",
        ios_store: "https://apps.apple.com/jp/app/%E6%A5%BD%E5%A4%A9%E3%83%9D%E3%82%A4%E3%83%B3%E3%83%88%E3%82%AF%E3%83%A9%E3%83%96/id1094107454",
        android_store: "https://play.google.com/store/apps/details?id=jp.co.rakuten.pointclub",
    },
    BuiltinEntry {
        id: "3",
        name: "dポイント",
        logo: "/images/dpoint_logo.png",
        web_url: "https://dpoint.jp/",
        ios_scheme: "dpoint-app://",
        android_scheme: "dpoint://",
        ios_store: "https://apps.apple.com/jp/app/d%E3%83%9D%E3%82%A4%E3%83%B3%E3%83%88%E3%82%AF%E3%83%A9%E3%83%96/id1093466147",
        android_store: "https://play.google.com/store/apps/details?id=com.nttdocomo.dpoint",
    },
    BuiltinEntry {
        id: "4",
        name: "Ponta",
        logo: "/images/ponta_logo.png",
        web_url: "https://point.recruit.co.jp/",
        ios_scheme: "pontaweb://",
        android_scheme: "ponta://",
        ios_store: "https://apps.apple.com/jp/app/ponta/id533199470",
        android_store: "https://play.google.com/store/apps/details?id=jp.co.recruit.pontalink",
    },
    BuiltinEntry {
        id: "5",
        name: "PayPayポイント",
        logo: "/images/paypay_point_logo.png",
        web_url: "https://www.paypay.ne.jp/point/",
        ios_scheme: "paypay://",
        android_scheme: "paypay://",
        ios_store: "https://apps.apple.com/jp/app/paypay-qr/id1435783608",
        android_store: "https://play.google.com/store/apps/details?id=jp.ne.paypay.android.app",
    },
];

/// Brand names the recognition salvage pass looks for in free-form model output.
pub const KNOWN_PAYMENT_BRANDS: &[&str] =
    &["PayPay", "LINE Pay", "楽天ペイ", "d払い", "au PAY", "メルペイ"];

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Owned copies of the built-in entries for `kind`.
pub fn entries(kind: CatalogKind) -> Vec<CatalogEntry> {
    let source = match kind {
        CatalogKind::Payment => PAYMENT_APPS,
        CatalogKind::Point => POINT_APPS,
    };

    source
        .iter()
        .map(|e| CatalogEntry {
            id: e.id.to_string(),
            name: e.name.to_string(),
            logo_ref: non_empty(e.logo),
            web_url: e.web_url.to_string(),
            ios_scheme: non_empty(e.ios_scheme),
            android_scheme: non_empty(e.android_scheme),
            ios_store_url: non_empty(e.ios_store),
            android_store_url: non_empty(e.android_store),
            api_available: false,
        })
        .collect()
}
