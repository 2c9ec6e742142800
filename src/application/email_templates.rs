use url::Url;

const BRAND_NAME: &str = "Remodely";

fn origin_label(frontend_url: &str) -> String {
    Url::parse(frontend_url)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()))
        .unwrap_or_else(|| frontend_url.to_string())
}

pub fn primary_button(url: &str, label: &str) -> String {
    format!(
        r#"<a href="{url}" style="display:inline-block;padding:12px 18px;background-color:#1d4ed8;color:#ffffff;text-decoration:none;border-radius:8px;font-weight:600;">{label}</a>"#
    )
}

pub fn verification_email(
    frontend_url: &str,
    first_name: &str,
    verify_url: &str,
) -> (String, String) {
    let subject = format!("Verify your {} email address", BRAND_NAME);
    let lead = format!(
        "{}, please confirm your email address to finish setting up your {BRAND_NAME} workspace.",
        greeting(first_name)
    );
    let button = primary_button(verify_url, "Verify email");
    let body = format!(
        r#"{button}<p style="margin:12px 0 0;color:#374151;">This link expires in 24 hours. If the button doesn't work, paste this URL into your browser:</p><p style="margin:6px 0 0;word-break:break-all;color:#1d4ed8;">{verify_url}</p>"#
    );

    let html = wrap_email(
        frontend_url,
        "Confirm your email",
        &lead,
        &body,
        "you created an account",
    );
    (subject, html)
}

fn greeting(first_name: &str) -> String {
    if first_name.trim().is_empty() {
        "Hi there".to_string()
    } else {
        format!("Hi {}", first_name.trim())
    }
}

pub fn password_reset_email(
    frontend_url: &str,
    first_name: &str,
    reset_url: &str,
) -> (String, String) {
    let subject = format!("Reset your {} password", BRAND_NAME);
    let lead = format!(
        "{}, we received a request to reset the password for your {BRAND_NAME} account.",
        greeting(first_name)
    );
    let button = primary_button(reset_url, "Reset password");
    let body = format!(
        r#"{button}<p style="margin:12px 0 0;color:#374151;">This link expires in 10 minutes. If the button doesn't work, paste this URL into your browser:</p><p style="margin:6px 0 0;word-break:break-all;color:#1d4ed8;">{reset_url}</p>"#
    );

    let html = wrap_email(
        frontend_url,
        "Password reset request",
        &lead,
        &body,
        "a password reset was requested for this address",
    );
    (subject, html)
}

pub fn reset_code_sms(code: &str) -> String {
    format!("Your {BRAND_NAME} password reset code is {code}. It expires in 10 minutes.")
}

pub fn wrap_email(
    frontend_url: &str,
    headline: &str,
    lead: &str,
    body_html: &str,
    reason: &str,
) -> String {
    let origin = origin_label(frontend_url);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <body style="background:#f8fafc;margin:0;padding:24px;font-family:Arial,Helvetica,sans-serif;">
    <div style="max-width:560px;margin:0 auto;background:#ffffff;border:1px solid #e5e7eb;border-radius:12px;padding:24px;">
      <div style="font-size:12px;letter-spacing:0.08em;text-transform:uppercase;color:#6b7280;">{brand} - {origin}</div>
      <h1 style="margin:12px 0 8px;font-size:22px;color:#111827;">{headline}</h1>
      <p style="margin:0 0 12px;font-size:15px;color:#111827;line-height:1.6;">{lead}</p>
      {body_html}
      <div style="margin-top:20px;padding-top:16px;border-top:1px solid #e5e7eb;">
        <p style="margin:0 0 6px;font-size:13px;color:#4b5563;">Why you got this email: {reason}.</p>
        <p style="margin:0;font-size:13px;color:#4b5563;">If you didn't request this, you can safely ignore it.</p>
      </div>
    </div>
  </body>
</html>
"#,
        brand = BRAND_NAME,
    )
}
