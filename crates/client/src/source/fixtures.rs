//! Deterministic backend fixtures.
//!
//! Payloads deliberately reproduce the backend's naming drift
//! (`firstname`/`firstName`, `priceTTC`/`amount`, string amounts with a
//! decimal comma, flat and nested error bodies) so the service mappers are
//! exercised the same way in mock and real mode.

use jdp_core::NewsKind;
use reqwest::Method;
use serde_json::{Value, json};

use crate::http::{ApiRequest, HttpError};

const MOCK_BASKET_CODE: &str = "MOCK-BASKET-001";
const PUBLISHABLE_KEY: &str = "pk_test_jdp_mock";
const NEWS_PAGE_SIZE: usize = 2;

pub(super) fn respond(request: &ApiRequest) -> Result<Value, HttpError> {
    let path = request.path.trim_end_matches('/');
    let path = if path.starts_with('/') || path.is_empty() {
        path.to_string()
    } else {
        format!("/{path}")
    };

    match (&request.method, path.as_str()) {
        // Auth
        (&Method::POST, "/auth/login") => login(request),
        (&Method::POST, "/auth/register") => register(request),
        (&Method::GET, "/auth/me") => Ok(json!({ "data": user() })),
        (&Method::PUT, "/auth/me") => Ok(json!({ "data": updated_user(request) })),
        (&Method::POST, "/auth/logout") => Ok(json!({ "success": true })),
        (&Method::POST, "/auth/forgot-password") => Ok(json!({
            "success": true,
            "message": "Si un compte existe pour cette adresse, un e-mail vient d'être envoyé.",
        })),

        // API-backed cart
        (&Method::GET, "/fetchBasket") => Ok(basket(MOCK_BASKET_CODE, &[("ref-napoleon-20f", 1)])),
        (&Method::POST, "/addReference") => add_reference(request),
        (&Method::POST, "/basketChangeQuantityReference") => change_quantity(request),

        // Catalogs
        (&Method::GET, "/fetchStore") => Ok(json!({ "references": shop_references() })),
        (&Method::GET, "/fetchOneClickCatalog") => Ok(json!({ "plans": plans() })),

        // One-click basket and payments
        (&Method::POST, "/fetchOneClickBasket") => fetch_oneclick_basket(request),
        (&Method::POST, "/addOneClick") => add_oneclick(request),
        (&Method::POST, "/deleteOneClick") => Ok(json!({
            "basketCode": request.body_str("basketCode"),
            "item": null,
        })),
        (&Method::POST, "/oneClickCheckout") => oneclick_checkout(request),
        (&Method::POST, "/oneClickInitPayment") => {
            let code = required(request, "basketCode")?;
            Ok(json!({
                "clientSecret": format!("seti_mock_{}_secret_jdp", slugify(code)),
                "publishableKey": PUBLISHABLE_KEY,
            }))
        }
        (&Method::POST, "/initPayment") => {
            let code = required(request, "basketCode")?;
            Ok(json!({
                "client_secret": format!("pi_mock_{}_secret_jdp", slugify(code)),
                "publishable_key": PUBLISHABLE_KEY,
            }))
        }

        // Account
        (&Method::GET, "/fetchUserSubscription") => Ok(json!({ "subscription": user_subscription() })),
        (&Method::POST, "/updateOneClickPayment") => {
            required(request, "paymentMethodId")?;
            Ok(json!({ "success": true }))
        }
        (&Method::GET, "/fetchPaidInvoicePerOrder") => Ok(json!({ "invoices": invoices() })),
        (&Method::GET | &Method::POST, "/fetchUserAdress") => Ok(json!({ "adresses": addresses() })),
        (&Method::POST, "/createAdress") => create_address(request),
        (&Method::POST, "/updateAdress") => {
            required(request, "id")?;
            Ok(json!({ "adress": request.body.clone().unwrap_or(Value::Null) }))
        }
        (&Method::POST, "/deleteAdress") => {
            required(request, "id")?;
            Ok(json!({ "success": true }))
        }

        // Webinars
        (&Method::GET, "/api/fetchWebinarList") => Ok(webinars()),

        // News
        (&Method::GET, "/api/news") => news_list(request),
        (&Method::GET, "/api/news/trending") => Ok(json!({ "data": summaries(&["or-record-historique", "argent-industriel", "banques-centrales-achats"]) })),
        (&Method::GET, "/api/news/latest") => Ok(json!({ "data": summaries(&["banques-centrales-achats", "or-record-historique", "flash-fed-taux"]) })),
        (&Method::GET, p) if p.starts_with("/api/news/") => news_detail(p.trim_start_matches("/api/news/")),

        // Bookmarks
        (&Method::GET, "/api/bookmarks") => Ok(json!({
            "bookmarks": [{ "slug": "or-record-historique", "createdAt": "2024-10-01T08:00:00Z" }],
        })),
        (&Method::POST, "/api/bookmarks") => {
            required(request, "slug")?;
            Ok(json!({ "success": true }))
        }
        (&Method::DELETE, p) if p.starts_with("/api/bookmarks/") => Ok(json!({ "success": true })),

        // Legacy account linking
        (&Method::POST, "/api/legacy/lookup") => legacy_lookup(request),
        (&Method::POST, "/api/legacy/link") => legacy_link(request),

        // Chart endpoint
        (&Method::GET, "/manifest") => Ok(json!({ "version": "11.4.8", "theme": "jdp-metaux" })),
        (&Method::GET, "/chart") => chart(request),

        (method, p) => Err(status(404, "not_found", &format!("No mock route for {method} {p}"))),
    }
}

fn status(status: u16, code: &str, message: &str) -> HttpError {
    HttpError::Status {
        status,
        body: json!({ "code": code, "message": message }).to_string(),
    }
}

fn required<'a>(request: &'a ApiRequest, field: &str) -> Result<&'a str, HttpError> {
    request
        .body_str(field)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| status(422, "validation", &format!("Le champ {field} est requis.")))
}

fn slugify(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

// =============================================================================
// Auth
// =============================================================================

fn login(request: &ApiRequest) -> Result<Value, HttpError> {
    let email = required(request, "email")?;
    let password = request.body_str("password").unwrap_or_default();
    if password.len() < 6 {
        return Err(status(
            401,
            "invalid_credentials",
            "Identifiants incorrects.",
        ));
    }
    Ok(json!({
        "access_token": format!("mock.{}", slugify(email)),
        "token_type": "Bearer",
        "expires_in": 3600,
    }))
}

fn register(request: &ApiRequest) -> Result<Value, HttpError> {
    let email = required(request, "email")?;
    required(request, "password")?;
    if email.starts_with("existing") {
        return Err(HttpError::Status {
            status: 409,
            body: json!({
                "error": { "code": "email_taken", "message": "Un compte existe déjà avec cet e-mail." }
            })
            .to_string(),
        });
    }
    Ok(json!({
        "token": format!("mock.{}", slugify(email)),
        "expiresIn": 7200,
    }))
}

fn user() -> Value {
    json!({
        "id": 4217,
        "email": "Camille.Martin@example.fr",
        "firstname": "Camille",
        "lastName": "Martin",
        "phone": "+33 6 12 34 56 78",
        "birthDate": "1984-03-12",
        "jdpStar": "12",
        "isVerified": 1,
        "acceptsMarketing": false,
        "password": "$2y$10$mockedhashmockedhashmockedhash",
        "remember_token": "mock-remember",
        "stripeCustomerId": "cus_mock",
        "adresses": addresses(),
    })
}

fn updated_user(request: &ApiRequest) -> Value {
    let mut user = user();
    if let (Some(target), Some(Value::Object(update))) = (user.as_object_mut(), &request.body) {
        for (key, value) in update {
            target.insert(key.clone(), value.clone());
        }
    }
    user
}

// =============================================================================
// Cart
// =============================================================================

/// `(reference id, label, TTC unit price as sent by the backend)`.
const BASKET_REFERENCES: [(&str, &str, &str); 4] = [
    ("ref-napoleon-20f", "Napol&eacute;on 20 Francs", "389,90"),
    ("ref-krugerrand", "Krugerrand 1 once", "2150.00"),
    ("ref-lingot-100g", "Lingot d&#39;or 100 g", "7420"),
    ("ref-rapport-2024", "Rapport annuel 2024", "29,00"),
];

fn basket(code: &str, lines: &[(&str, u32)]) -> Value {
    let mut total_cents: i64 = 0;
    let references: Vec<Value> = lines
        .iter()
        .filter(|(_, qty)| *qty > 0)
        .filter_map(|(id, qty)| {
            let (_, label, price) = BASKET_REFERENCES.iter().find(|(rid, _, _)| rid == id)?;
            total_cents += cents(price) * i64::from(*qty);
            Some(json!({
                "idReference": id,
                "label": label,
                "priceTTC": price,
                "quantity": qty,
            }))
        })
        .collect();
    json!({
        "basketCode": code,
        "references": references,
        "totalTTC": format!("{}.{:02}", total_cents / 100, total_cents % 100),
    })
}

fn cents(price: &str) -> i64 {
    let normalized = price.replace(',', ".");
    let (units, fraction) = normalized.split_once('.').unwrap_or((normalized.as_str(), "0"));
    let units: i64 = units.parse().unwrap_or(0);
    let fraction: String = fraction.chars().chain(std::iter::repeat('0')).take(2).collect();
    let fraction: i64 = fraction.parse().unwrap_or(0);
    units * 100 + fraction
}

fn add_reference(request: &ApiRequest) -> Result<Value, HttpError> {
    let id = required(request, "idReference")?;
    if !BASKET_REFERENCES.iter().any(|(rid, _, _)| *rid == id) {
        return Ok(json!({
            "success": false,
            "error": { "code": "unknown_reference", "message": "Cette référence n'est plus disponible." },
        }));
    }
    let quantity = quantity(request).unwrap_or(1);
    let code = request.body_str("basketCode").unwrap_or(MOCK_BASKET_CODE);
    Ok(basket(code, &[(id, quantity)]))
}

fn change_quantity(request: &ApiRequest) -> Result<Value, HttpError> {
    let Some(code) = request.body_str("basketCode").filter(|c| !c.is_empty()) else {
        return Err(status(410, "basket_expired", "Votre panier a expiré."));
    };
    let id = required(request, "idReference")?;
    let quantity = quantity(request).unwrap_or(0);
    Ok(basket(code, &[(id, quantity)]))
}

fn quantity(request: &ApiRequest) -> Option<u32> {
    let value = request.body.as_ref()?.get("quantity")?;
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        .and_then(|q| u32::try_from(q).ok())
}

// =============================================================================
// Catalogs
// =============================================================================

fn shop_references() -> Value {
    json!([
        {
            "id": "ref-napoleon-20f",
            "slug": "napoleon-20-francs",
            "name": "Napol&eacute;on 20 Francs &amp; Marianne",
            "description": "Pi&egrave;ce d'or fran&ccedil;aise de 5,81 g.",
            "image": "https://cdn.example.fr/shop/napoleon.webp",
            "collections": ["pieces-or", "best-sellers"],
            "createdAt": "2023-02-01T09:00:00Z",
            "products": [
                {
                    "id": "prd-napoleon-unit",
                    "name": "À l'unité",
                    "type": "physical",
                    "weight": 6.45,
                    "prices": [{ "currency": "EUR", "priceTTC": "389,90", "priceHT": "389,90", "tva": 0, "isPromo": false }]
                },
                {
                    "id": "prd-napoleon-lot10",
                    "name": "Lot de 10",
                    "type": "physical",
                    "weight": "64,5",
                    "prices": [{ "currency": "EUR", "amount": 3799.0, "htAmount": 3799.0, "vatRate": 0, "isPromotional": true }]
                }
            ]
        },
        {
            "id": "ref-krugerrand",
            "slug": "krugerrand-1-once",
            "title": "Krugerrand 1 once",
            "collection": "pieces-or",
            "createdAt": "2022-06-15T09:00:00Z",
            "products": [
                {
                    "id": "prd-krugerrand",
                    "name": "Krugerrand",
                    "type": "physique",
                    "prices": [{ "currency": "EUR", "amount": "2150.00", "htAmount": "2150.00", "vatRate": "0" }]
                }
            ]
        },
        {
            "id": "ref-lingot-100g",
            "slug": "lingot-or-100g",
            "name": "Lingot d&#39;or 100 g",
            "collections": ["lingots"],
            "createdAt": "2024-01-10T09:00:00Z",
            "products": [
                {
                    "id": "prd-lingot-100g",
                    "name": "Lingot 100 g",
                    "type": "physical",
                    "weight": 100,
                    "prices": [{ "currency": "EUR", "amount": 7420, "htAmount": 7420, "vatRate": 0 }]
                }
            ]
        },
        {
            "id": "ref-rapport-2024",
            "slug": "rapport-annuel-2024",
            "name": "Rapport annuel 2024",
            "collections": ["publications", "best-sellers"],
            "createdAt": "2024-03-01T09:00:00Z",
            "products": [
                {
                    "id": "prd-rapport-pdf",
                    "name": "Édition numérique",
                    "type": "immaterial",
                    "prices": [{ "currency": "EUR", "amount": "29,00", "htAmount": "24,17", "vatRate": 20 }]
                }
            ]
        }
    ])
}

fn plans() -> Value {
    json!([
        {
            "id": "essentiel",
            "name": "Essentiel",
            "description": "La lettre mensuelle et les analyses de marché.",
            "priceTTC": "9,90",
            "interval": "month",
            "features": ["Lettre mensuelle", "Analyses hebdomadaires"]
        },
        {
            "id": "premium",
            "label": "Premium",
            "description": "Tout Essentiel, plus les webinaires et les replays.",
            "price": 19.9,
            "intervalMonths": 1,
            "features": ["Lettre mensuelle", "Analyses hebdomadaires", "Webinaires en direct", "Replays"],
            "highlight": true
        },
        {
            "id": "annuel",
            "name": "Premium annuel",
            "price": "199,00",
            "interval": "year",
            "features": "Deux mois offerts"
        }
    ])
}

fn plan(id: &str) -> Option<Value> {
    plans()
        .as_array()?
        .iter()
        .find(|p| p.get("id").and_then(Value::as_str) == Some(id))
        .cloned()
}

fn oneclick_item(plan: &Value) -> Value {
    json!({
        "idOneClick": plan.get("id"),
        "name": plan.get("name").or_else(|| plan.get("label")),
        "priceTTC": plan.get("priceTTC").or_else(|| plan.get("price")),
    })
}

fn fetch_oneclick_basket(request: &ApiRequest) -> Result<Value, HttpError> {
    let Some(code) = request.body_str("basketCode").filter(|c| !c.is_empty()) else {
        return Ok(json!({ "basketCode": null, "item": null }));
    };
    let item = code
        .strip_prefix("OC-")
        .and_then(plan)
        .map_or(Value::Null, |p| oneclick_item(&p));
    Ok(json!({ "basketCode": code, "item": item }))
}

fn add_oneclick(request: &ApiRequest) -> Result<Value, HttpError> {
    let plan_id = required(request, "planId")?;
    let Some(plan) = plan(plan_id) else {
        return Err(status(404, "not_found", "Formule introuvable."));
    };
    Ok(json!({
        "basketCode": format!("OC-{plan_id}"),
        "item": oneclick_item(&plan),
    }))
}

fn oneclick_checkout(request: &ApiRequest) -> Result<Value, HttpError> {
    let code = required(request, "basketCode")?;
    Ok(json!({
        "success": true,
        "subscriptionId": format!("sub_mock_{}", slugify(code)),
    }))
}

// =============================================================================
// Account
// =============================================================================

fn user_subscription() -> Value {
    json!({
        "id": "sub_mock_premium",
        "planName": "Premium",
        "status": "active",
        "priceTTC": "19,90",
        "currentPeriodEnd": 1_767_225_600,
        "card": { "brand": "visa", "last4": "4242" }
    })
}

fn invoices() -> Value {
    json!([
        {
            "idOrder": 90211,
            "invoiceNumber": "F-2024-000311",
            "date": "2024-09-14 10:32:00",
            "amountTTC": "389,90",
            "pdf": "https://cdn.example.fr/invoices/F-2024-000311.pdf",
            "status": "paid"
        },
        {
            "orderId": "90342",
            "number": "F-2024-000402",
            "createdAt": "2024-11-02",
            "total": 29,
            "pdfUrl": null,
            "status": "partially_refunded"
        }
    ])
}

fn addresses() -> Value {
    json!([
        {
            "id": 311,
            "label": "Domicile",
            "firstname": "Camille",
            "lastname": "Martin",
            "address": "12 rue des Orfèvres",
            "zipcode": "75001",
            "city": "Paris",
            "country": "FR",
            "isDefaultShipping": true,
            "isDefaultBilling": true
        },
        {
            "id": 312,
            "label": "Bureau",
            "firstName": "Camille",
            "lastName": "Martin",
            "company": "Martin Conseil",
            "street": "4 place de la Bourse",
            "streetComplement": "3e étage",
            "postalCode": "69002",
            "city": "Lyon",
            "country": "FR",
            "is_default_shipping": 0,
            "is_default_billing": 0
        }
    ])
}

fn create_address(request: &ApiRequest) -> Result<Value, HttpError> {
    let postal = required(request, "postalCode")?;
    let mut address = request.body.clone().unwrap_or_else(|| json!({}));
    if let Some(obj) = address.as_object_mut() {
        obj.insert("id".to_string(), json!(format!("adr-mock-{postal}")));
    }
    Ok(json!({ "adress": address }))
}

// =============================================================================
// Webinars
// =============================================================================

fn webinars() -> Value {
    json!({
        "webinars": [
            {
                "id": 71,
                "title": "L'or face à l'inflation",
                "speaker": "Jean-François Faure",
                "date": "2024-09-12T18:00:00Z",
                "duration": 60,
                "replay": "https://replay.example.fr/w/71",
                "isReplay": true
            },
            {
                "id": 72,
                "title": "Argent métal : perspectives 2025",
                "speaker": "Claire Dubois",
                "date": "2024-10-10T18:00:00Z",
                "duration": "75",
                "replayUrl": "https://replay.example.fr/w/72",
                "isReplay": false
            },
            {
                "id": 73,
                "title": "Constituer un patrimoine en métaux",
                "speaker": "Jean-François Faure",
                "scheduledAt": "2025-11-20T18:00:00Z",
                "durationMinutes": 60,
                "registrationUrl": "https://webinaire.example.fr/inscription/73"
            },
            {
                "id": 74,
                "title": "Fiscalité de l'or : le point",
                "scheduledAt": "2025-12-18T18:00:00Z",
                "registrationUrl": "https://webinaire.example.fr/inscription/74",
                "isReplay": true
            }
        ],
        "lastWebinar": 1,
        "nextWebinar": "2"
    })
}

// =============================================================================
// News
// =============================================================================

fn news_items() -> Vec<Value> {
    vec![
        json!({
            "id": 501,
            "slug": "banques-centrales-achats",
            "title": "Les banques centrales accélèrent leurs achats d&#39;or",
            "type": "article",
            "publishedAt": "2024-11-04T07:30:00Z",
            "author": { "name": "Claire Dubois" },
            "tags": ["or", "banques centrales"],
            "image": "https://cdn.example.fr/news/501.webp",
            "content": "<p>Les banques centrales ont acheté <strong>1 037 tonnes</strong> d'or en 2023.</p>",
            "encadres": [
                { "title": "À retenir", "content": "<p>La Chine reste le premier acheteur.</p>" }
            ]
        }),
        json!({
            "id": 502,
            "slug": "or-record-historique",
            "title": "L'or atteint un record historique",
            "type": "article",
            "published_at": "2024-10-30 09:00:00",
            "author": "Jean-François Faure",
            "tags": "or",
            "content": "<p>Le métal jaune a dépassé les 2 700 $ l'once.</p><p>Une hausse portée par la demande.</p>"
        }),
        json!({
            "id": 503,
            "slug": "argent-industriel",
            "title": "L'argent, métal industriel",
            "type": "vidéo",
            "publishedAt": "2024-10-21T12:00:00Z",
            "youtubeId": "dQw4w9WgXcQ",
            "duration": 754
        }),
        json!({
            "id": 504,
            "slug": "flash-fed-taux",
            "title": "Flash : la Fed baisse ses taux",
            "type": "brève",
            "publishedAt": "2024-09-18T18:05:00Z",
            "content": "<p>Baisse de 50 points de base.</p>"
        }),
        json!({
            "id": 505,
            "slug": "platine-entretien",
            "title": "Platine : entretien avec un fondeur",
            "type": "video",
            "publishedAt": "2024-09-02T08:00:00Z",
            "video": { "youtube_id": "9bZkp7q19f0", "durationSeconds": "1260" }
        }),
    ]
}

/// List shape: no body fields beyond the excerpt source.
fn summary(item: &Value) -> Value {
    let mut item = item.clone();
    if let Some(obj) = item.as_object_mut() {
        obj.remove("encadres");
    }
    item
}

fn summaries(slugs: &[&str]) -> Value {
    let items = news_items();
    Value::Array(
        slugs
            .iter()
            .filter_map(|slug| {
                items
                    .iter()
                    .find(|i| i.get("slug").and_then(Value::as_str) == Some(slug))
                    .map(summary)
            })
            .collect(),
    )
}

fn news_list(request: &ApiRequest) -> Result<Value, HttpError> {
    let page: usize = request
        .query_value("page")
        .and_then(|p| p.parse().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(1);
    let kind = request.query_value("type");
    let matching: Vec<Value> = news_items()
        .into_iter()
        .filter(|item| {
            kind.is_none_or(|k| {
                let t = item.get("type").and_then(Value::as_str).unwrap_or_default();
                NewsKind::from_wire(t).is_some() && NewsKind::from_wire(t) == NewsKind::from_wire(k)
            })
        })
        .collect();
    let last_page = matching.len().div_ceil(NEWS_PAGE_SIZE).max(1);
    let data: Vec<Value> = matching
        .iter()
        .skip((page - 1) * NEWS_PAGE_SIZE)
        .take(NEWS_PAGE_SIZE)
        .map(summary)
        .collect();
    Ok(json!({
        "data": data,
        "meta": { "current_page": page, "last_page": last_page },
    }))
}

fn news_detail(slug: &str) -> Result<Value, HttpError> {
    news_items()
        .into_iter()
        .find(|i| i.get("slug").and_then(Value::as_str) == Some(slug))
        .map(|item| json!({ "data": item }))
        .ok_or_else(|| status(404, "not_found", "Article introuvable."))
}

// =============================================================================
// Legacy accounts
// =============================================================================

fn legacy_lookup(request: &ApiRequest) -> Result<Value, HttpError> {
    let email = required(request, "email")?;
    if email.ends_with("@ancien-jdp.fr") {
        Ok(json!({
            "found": true,
            "legacyId": "L-1042",
            "maskedEmail": "c***@ancien-jdp.fr",
        }))
    } else {
        Ok(json!({ "found": false }))
    }
}

fn legacy_link(request: &ApiRequest) -> Result<Value, HttpError> {
    required(request, "legacyId")?;
    let code = required(request, "code")?;
    if code == "000000" {
        return Ok(json!({ "success": false, "message": "Code de vérification invalide." }));
    }
    Ok(json!({ "success": true, "jdpStar": 25 }))
}

// =============================================================================
// Charts
// =============================================================================

fn chart(request: &ApiRequest) -> Result<Value, HttpError> {
    let family = request
        .query_value("family")
        .ok_or_else(|| status(422, "validation", "family is required"))?;
    let series = request.query_value("series").unwrap_or("eur");
    let from = request.query_value("from").unwrap_or("2024-01-01");
    let to = request.query_value("to").unwrap_or("2024-12-31");
    Ok(json!({
        "title": format!("{family} ({series})"),
        "series": [{
            "name": series,
            "data": [[from, 1950.4], [to, 2405.1]],
        }],
        "options": {
            "chart": { "type": "line" },
            "xAxis": { "type": "datetime" },
        },
    }))
}
