//! Server-rendered HTML for the three views.

use chrono::FixedOffset;

use crate::review::{format_timestamp, ReviewSnapshot};
use crate::store::StudentRecord;
use crate::submission::ACKNOWLEDGMENT_TTL_SECS;
use crate::validation::{
    is_valid_phone, Department, FieldError, RegistrationForm, Year, PHONE_DIGITS, PIN_MAX_DIGITS,
};

/// Escapes text for use in element content and quoted attribute values.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, unlocked: bool, refresh_after_secs: Option<i64>, body: &str) -> String {
    // Only without scripting; a live page hides the banner in place instead
    let refresh = refresh_after_secs
        .map(|s| format!(r#"<noscript><meta http-equiv="refresh" content="{s}"></noscript>"#))
        .unwrap_or_default();
    let dashboard_href = if unlocked { "/dashboard" } else { "/unlock" };
    format!(
        r#"<!doctype html>
<html lang="en">
    <head>
        <meta charset="utf-8">
        <meta name="viewport" content="width=device-width, initial-scale=1">
        {refresh}
        <title>{title}</title>
    </head>
    <body>
        <nav>
            <a href="/"><strong>StudentReg</strong></a>
            <a href="/">Home</a>
            <a href="{dashboard_href}">Dashboard</a>
        </nav>
        <main>
{body}
        </main>
    </body>
</html>
"#,
        title = escape(title),
    )
}

fn field_error(errors: &[FieldError], field: FieldError) -> String {
    if errors.contains(&field) {
        format!(r#"<p class="error" id="{}-error">{}</p>"#, field.field(), field)
    } else {
        String::new()
    }
}

fn options<'a>(placeholder: &str, selected: &str, values: impl Iterator<Item = &'a str>) -> String {
    let mut html = format!(r#"<option value="">{}</option>"#, escape(placeholder));
    for value in values {
        let attr = if value == selected { " selected" } else { "" };
        html.push_str(&format!(
            r#"<option value="{v}"{attr}>{v}</option>"#,
            v = escape(value)
        ));
    }
    html
}

/// The registration form.
///
/// `errors` are rendered next to their fields. A non-empty phone that is not
/// ten digits always gets its hint, as it would while typing.
pub fn registration_page(
    form: &RegistrationForm,
    errors: &[FieldError],
    notice: Option<&str>,
    acknowledged: bool,
    unlocked: bool,
) -> String {
    let mut errors = errors.to_vec();
    if !form.phone.is_empty() && !is_valid_phone(&form.phone) && !errors.contains(&FieldError::Phone) {
        errors.push(FieldError::Phone);
    }

    let banner = if acknowledged {
        format!(
            r#"<div class="success" role="status" id="acknowledgment">Form submitted successfully!</div>
<script>
    setTimeout(function () {{
        document.getElementById("acknowledgment").hidden = true;
    }}, {ms});
</script>"#,
            ms = ACKNOWLEDGMENT_TTL_SECS * 1000,
        )
    } else {
        String::new()
    };
    let notice = notice
        .map(|n| format!(r#"<div class="notice error" role="alert"><strong>Error</strong> {}</div>"#, escape(n)))
        .unwrap_or_default();
    let disabled = if form.is_submittable() { "" } else { " disabled" };

    let body = format!(
        r#"<h1>Student Registration</h1>
<p>Fill in your academic details below</p>
{banner}{notice}
<form method="post" action="/" id="registration">
    <label for="name">Name</label>
    <input id="name" name="name" placeholder="Full Name" value="{name}" required>
    {name_err}
    <label for="phone">Phone Number</label>
    <input id="phone" name="phone" placeholder="10-digit number" inputmode="numeric" maxlength="{phone_len}" value="{phone}" required>
    {phone_err}
    <label for="email">Email ID</label>
    <input id="email" name="email" type="email" placeholder="you@example.com" value="{email}" required>
    {email_err}
    <label for="college">College Name</label>
    <input id="college" name="college" placeholder="Your college" value="{college}" required>
    {college_err}
    <label for="department">Department</label>
    <select id="department" name="department">{departments}</select>
    {department_err}
    <label for="year">Year of Studying</label>
    <select id="year" name="year">{years}</select>
    {year_err}
    <button type="submit"{disabled}>Submit</button>
</form>
<script>
    (function () {{
        var form = document.getElementById("registration");
        var phone = document.getElementById("phone");
        var button = form.querySelector("button");
        var email = /^[^\s@]+@[^\s@]+\.[^\s@]+$/;
        function check() {{
            phone.value = phone.value.replace(/\D/g, "").slice(0, {phone_len});
            var ok = form.name.value.trim() && /^\d{{{phone_len}}}$/.test(phone.value) &&
                email.test(form.email.value) && form.college.value.trim() &&
                form.department.value && form.year.value;
            button.disabled = !ok;
        }}
        form.addEventListener("input", check);
        form.addEventListener("change", check);
        form.addEventListener("submit", function () {{ button.disabled = true; }});
    }})();
</script>"#,
        name = escape(&form.name),
        phone = escape(&form.phone),
        email = escape(&form.email),
        college = escape(&form.college),
        phone_len = PHONE_DIGITS,
        name_err = field_error(&errors, FieldError::Name),
        phone_err = field_error(&errors, FieldError::Phone),
        email_err = field_error(&errors, FieldError::Email),
        college_err = field_error(&errors, FieldError::College),
        department_err = field_error(&errors, FieldError::Department),
        year_err = field_error(&errors, FieldError::Year),
        departments = options(
            "Select department",
            &form.department,
            Department::ALL.iter().map(|d| d.as_str())
        ),
        years = options("Select year", &form.year, Year::ALL.iter().map(|y| y.as_str())),
    );

    let refresh = acknowledged.then_some(ACKNOWLEDGMENT_TTL_SECS);
    layout("Student Registration", unlocked, refresh, &body)
}

/// The PIN dialog. The input always starts empty.
pub fn pin_page(invalid: bool) -> String {
    let error = if invalid {
        r#"<p class="error" role="alert">Invalid PIN</p>"#
    } else {
        ""
    };
    let body = format!(
        r#"<h1>Admin Access</h1>
<p>Enter the {max}-digit PIN to access the dashboard.</p>
<form method="post" action="/unlock">
    <input name="pin" type="password" inputmode="numeric" maxlength="{max}" placeholder="Enter PIN" value="" autofocus>
    {error}
    <button type="submit">Unlock</button>
</form>
<p><a href="/unlock/cancel">Cancel</a></p>"#,
        max = PIN_MAX_DIGITS,
    );
    layout("Admin Access", false, None, &body)
}

fn record_row(record: &StudentRecord) -> String {
    let haystack = [
        &record.name,
        &record.email,
        &record.college,
        &record.department,
    ]
    .iter()
    .map(|f| f.to_lowercase())
    .collect::<Vec<_>>()
    .join("\n");
    format!(
        r#"<tr data-search="{search}"><td><strong>{name}</strong></td><td>{phone}</td><td>{email}</td><td>{college}</td><td>{department}</td><td>{year}</td></tr>"#,
        search = escape(&haystack),
        name = escape(&record.name),
        phone = escape(&record.phone),
        email = escape(&record.email),
        college = escape(&record.college),
        department = escape(&record.department),
        year = escape(&record.year),
    )
}

/// The dashboard: summary cards, search box and the filtered table.
pub fn dashboard_page(snapshot: &ReviewSnapshot, query: &str, offset: FixedOffset) -> String {
    let summary = snapshot.summary();
    let latest_at = summary
        .latest
        .as_ref()
        .map(|l| format!("<p>{}</p>", escape(&format_timestamp(l.created_at, offset))))
        .unwrap_or_default();

    let degraded = if snapshot.is_degraded() {
        r#"<div class="notice error" role="alert">Records could not be loaded. Try refreshing.</div>"#
    } else {
        ""
    };

    let filtered = snapshot.filter(query);
    let rows: String = filtered.iter().map(|r| record_row(r)).collect();
    let empty_style = if filtered.is_empty() { "" } else { " hidden" };

    let body = format!(
        r##"<h1>Admin Dashboard</h1>
<p>Overview of all student submissions</p>
<p><a href="/dashboard/export" download="student_records.xlsx">Download as Excel</a></p>
<form method="post" action="/dashboard/refresh"><button type="submit">Refresh</button></form>
<form method="post" action="/lock"><button type="submit">Lock</button></form>
{degraded}
<section>
    <h2>Total Submissions</h2>
    <p id="total">{total}</p>
</section>
<section>
    <h2>Latest Entry</h2>
    <p id="latest">{latest}</p>
    {latest_at}
</section>
<h2>All Records</h2>
<form method="get" action="/dashboard">
    <input id="search" name="q" placeholder="Search records…" value="{query}">
</form>
<table>
    <thead>
        <tr><th>Name</th><th>Phone</th><th>Email</th><th>College</th><th>Department</th><th>Year</th></tr>
    </thead>
    <tbody id="records">
{rows}
        <tr id="no-records"{empty_style}><td colspan="6">No records found</td></tr>
    </tbody>
</table>
<script>
    (function () {{
        var search = document.getElementById("search");
        var rows = document.querySelectorAll("#records tr[data-search]");
        var empty = document.getElementById("no-records");
        search.addEventListener("input", function () {{
            var q = search.value.toLowerCase();
            var shown = 0;
            rows.forEach(function (row) {{
                var hit = row.dataset.search.indexOf(q) !== -1;
                row.hidden = !hit;
                if (hit) shown++;
            }});
            empty.hidden = shown !== 0;
        }});
    }})();
</script>"##,
        total = summary.total,
        latest = escape(summary.latest_name()),
        query = escape(query),
    );

    layout("Admin Dashboard", true, None, &body)
}
