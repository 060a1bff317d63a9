use chrono::{Datelike, NaiveDate};

const MONTHS_ID: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];

/// Long Indonesian date, e.g. `04 Juni 2024`.
pub fn format_indonesian_date(date: NaiveDate) -> String {
    let month = MONTHS_ID
        .get(date.month0() as usize)
        .copied()
        .unwrap_or_default();
    format!("{:02} {} {}", date.day(), month, date.year())
}

pub fn billing_reminder_text(full_name: &str, rent_date: NaiveDate) -> String {
    format!(
        "Halo {}, ini pengingat bahwa Anda memiliki tagihan kos pada tanggal {}. Mohon lakukan pembayaran tepat waktu.",
        full_name.trim(),
        format_indonesian_date(rent_date)
    )
}
