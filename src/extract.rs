//! Scraping of opaque values out of portal pages.
//!
//! The portal has no API for any of these values, so each one is located by a marker string and
//! read from a fixed offset relative to the start of that marker. Every extraction is fallible:
//! a missing marker, an out-of-range offset or an empty value all yield `None`.

use crate::model::SystemInfo;

/// How far a value extends once its start has been located.
#[derive(Debug, Clone, Copy)]
pub enum Extent {
    /// Exactly `n` bytes, truncated at the end of the text.
    Fixed(usize),
    /// Up to the next `<`, which must appear within `n` bytes.
    UntilTag(usize),
}

#[derive(Debug, Clone, Copy)]
pub struct Marker {
    pub pattern: &'static str,
    pub offset: usize,
    pub extent: Extent,
}

impl Marker {
    pub const fn fixed(pattern: &'static str, offset: usize, len: usize) -> Self {
        Marker {
            pattern,
            offset,
            extent: Extent::Fixed(len),
        }
    }

    pub const fn until_tag(pattern: &'static str, offset: usize) -> Self {
        Marker {
            pattern,
            offset,
            extent: Extent::UntilTag(MAX_TAG_VALUE_LEN),
        }
    }

    pub fn extract<'a>(&self, text: &'a str) -> Option<&'a str> {
        let start = text.find(self.pattern)? + self.offset;
        if start >= text.len() {
            return None;
        }
        let value = match self.extent {
            Extent::Fixed(len) => text.get(start..floor_boundary(text, start + len))?,
            Extent::UntilTag(max) => {
                let window = text.get(start..floor_boundary(text, start + max))?;
                &window[..window.find('<')?]
            }
        };

        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }
}

const MAX_TAG_VALUE_LEN: usize = 100;
const ESS_INFO_WINDOW: usize = 1500;

pub const SIGNATURE: Marker = Marker::fixed("signatureG", 28, 44);
pub const TIMESTAMP: Marker = Marker::fixed("timestampG", 28, 10);
pub const SYSTEM_ID: Marker = Marker::fixed("system_id", 11, 4);
pub const ESS_ID: Marker = Marker::fixed("ess_id", 8, 4);

const JSESSIONID: Marker = Marker::fixed("JSESSIONID", 0, 55);
const AWSELB: Marker = Marker::fixed("AWSELB", 0, 145);
const AWSELBCOR: Marker = Marker::fixed("AWSELBCOR", 0, 149);

const ESS_INFO: &str = "essInfoItem";
const SYSTEM_NAME: Marker = Marker::until_tag("site_i ess", 44);
const SYSTEM_SERIAL: Marker = Marker::until_tag("<span class=\"tit\">", 18);
const PMS_SW: Marker = Marker::until_tag("PMS S/W Ver.", 83);
const PMS_HW: Marker = Marker::until_tag("PMS H/W Ver.", 83);
const PCS_SW: Marker = Marker::until_tag("PCS S/W Ver.", 81);
const PCS_HW: Marker = Marker::until_tag("PCS H/W Ver.", 83);

fn floor_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Short-lived signature and timestamp embedded in the sign-in page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginToken {
    pub signature: String,
    pub timestamp: String,
}

pub fn login_token(sign_in_page: &str) -> Option<LoginToken> {
    Some(LoginToken {
        signature: SIGNATURE.extract(sign_in_page)?.to_owned(),
        timestamp: TIMESTAMP.extract(sign_in_page)?.to_owned(),
    })
}

/// Build the portal cookie from the `Set-Cookie` values of the login redirect.
pub fn session_cookie(set_cookie: &str) -> Option<String> {
    let jsessionid = JSESSIONID.extract(set_cookie)?;
    let awselb = AWSELB.extract(set_cookie)?;
    let awselbcor = AWSELBCOR.extract(set_cookie)?;

    Some(format!(
        "{}; lang=de; country=DE; ctCode=DE; {}; {}; enervuCookieCompliance=on",
        jsessionid, awselb, awselbcor
    ))
}

/// Read the static description of the installation from the system info page.
///
/// Each field falls back to a placeholder on its own; `None` only when nothing at all was found.
pub fn system_info(html: &str) -> Option<SystemInfo> {
    let ess_info = html
        .find(ESS_INFO)
        .and_then(|start| html.get(start..floor_boundary(html, start + ESS_INFO_WINDOW)))
        .unwrap_or("");

    let fields = [
        SYSTEM_NAME.extract(html),
        SYSTEM_SERIAL.extract(ess_info),
        PMS_SW.extract(ess_info),
        PMS_HW.extract(ess_info),
        PCS_SW.extract(ess_info),
        PCS_HW.extract(ess_info),
    ];
    if fields.iter().all(Option::is_none) {
        return None;
    }

    let [name, serial, pms_sw, pms_hw, pcs_sw, pcs_hw] = fields;
    let or_dash = |v: Option<&str>| v.unwrap_or("-").to_owned();
    Some(SystemInfo {
        system_name: or_dash(name),
        system_serial: serial.unwrap_or("_").to_owned(),
        pms_sw: or_dash(pms_sw),
        pms_hw: or_dash(pms_hw),
        pcs_sw: or_dash(pcs_sw),
        pcs_hw: or_dash(pcs_hw),
    })
}
