use anyhow::Result;
use chrono::NaiveDate;
use rand::Rng;

use crate::{
    errors::StoreError,
    models::{ContactMethod, NewContact},
    store::ContactStore,
};

const FIRST_NAMES: [&str; 10] = [
    "Tom", "Johnny", "Jim", "Eric", "Amanda", "Grace", "Judy", "Frank", "Sally", "Will",
];
const LAST_NAMES: [&str; 10] = [
    "Connor",
    "Henderson",
    "Farley",
    "Henson",
    "Jeffries",
    "Carlin",
    "Anderson",
    "O' Sullivan",
    "Dorothy",
    "McDougal",
];

/// A random contact. `n` keeps the email unique across a single run.
pub fn random_contact(rng: &mut impl Rng, n: u32) -> NewContact {
    let first_name = FIRST_NAMES[rng.random_range(0..FIRST_NAMES.len())];
    let last_name = LAST_NAMES[rng.random_range(0..LAST_NAMES.len())];
    let email = format!(
        "{}.{}_{}@somemail.com",
        first_name.to_lowercase(),
        last_name.replace(['\'', ' '], "").to_lowercase(),
        n
    );

    let mut contact = NewContact::new(first_name, last_name, &email);

    if rng.random_bool(0.5) {
        let year = rng.random_range(1950..=2005);
        let month = rng.random_range(1..=12);
        let day = rng.random_range(1..=31);
        // Out-of-range days for short months are simply skipped
        if let Some(birthday) = NaiveDate::from_ymd_opt(year, month, day) {
            contact = contact.with_birthday(birthday);
        }
    }
    if rng.random_bool(0.3) {
        contact.phone = Some(format!("+380{:09}", rng.random_range(0..1_000_000_000u32)));
    }
    contact.preferred_contact_method = match rng.random_range(0..3) {
        0 => Some(ContactMethod::Email),
        1 => Some(ContactMethod::Sms),
        _ => None,
    };

    contact
}

/// Insert `count` random contacts, returning how many were stored.
pub async fn seed_contacts(store: &ContactStore, count: u32) -> Result<u32> {
    tracing::info!("Seeding {} contacts", count);

    let start = std::time::Instant::now();
    let salt: u32 = rand::rng().random_range(0..1_000_000);
    let mut stored = 0;

    for i in 0..count {
        // Keep the rng out of scope across the await
        let contact = random_contact(&mut rand::rng(), salt.wrapping_mul(10_000).wrapping_add(i));
        match store.create(contact).await {
            Ok(_) => stored += 1,
            Err(StoreError::DuplicateEmail(email)) => {
                tracing::warn!("Skipping duplicate email {}", email);
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!("Stored {} contacts in {:?}", stored, start.elapsed());

    Ok(stored)
}
