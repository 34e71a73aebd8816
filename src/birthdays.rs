use chrono::{Datelike, Days, NaiveDate};

use crate::models::Contact;

/// The date a birthday falls on in `year`. A Feb 29 birthday lands on Feb 28
/// when `year` is not a leap year.
pub fn occurrence_in(birthday: NaiveDate, year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, birthday.month(), birthday.day()).or_else(|| {
        if birthday.month() == 2 && birthday.day() == 29 {
            NaiveDate::from_ymd_opt(year, 2, 28)
        } else {
            None
        }
    })
}

/// The first occurrence of `birthday` on or after `today`.
pub fn next_occurrence(birthday: NaiveDate, today: NaiveDate) -> Option<NaiveDate> {
    match occurrence_in(birthday, today.year()) {
        Some(date) if date >= today => Some(date),
        _ => occurrence_in(birthday, today.year() + 1),
    }
}

/// Contacts whose next birthday falls within `[today, today + days]`, soonest
/// first. Contacts sharing a date keep their input order.
pub fn upcoming_birthdays(today: NaiveDate, days: u32, contacts: Vec<Contact>) -> Vec<Contact> {
    let end = today
        .checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX);

    let mut upcoming: Vec<(NaiveDate, Contact)> = contacts
        .into_iter()
        .filter_map(|contact| {
            let date = next_occurrence(contact.birthday?, today)?;
            (date <= end).then_some((date, contact))
        })
        .collect();

    // sort_by_key is stable
    upcoming.sort_by_key(|(date, _)| *date);

    upcoming.into_iter().map(|(_, contact)| contact).collect()
}
