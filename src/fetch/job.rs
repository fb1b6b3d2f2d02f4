use crate::calendar::jalali_date::JalaliDate;
use bon::Builder;

pub const DEFAULT_REQUEST_TIME: &str = "11:00";
pub const DEFAULT_REGION_TYPE: u32 = 1;

/// One day's request against the AQI endpoint.
///
/// ```
/// use iran_aqi::FetchJob;
///
/// let job = FetchJob::builder().date("1402/01/03".parse().unwrap()).build();
/// assert_eq!(job.time, "11:00");
/// assert_eq!(job.region_type, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct FetchJob {
    pub date: JalaliDate,
    /// `HH:MM` sent along with the date.
    #[builder(default = DEFAULT_REQUEST_TIME.to_string(), into)]
    pub time: String,
    #[builder(default = DEFAULT_REGION_TYPE)]
    pub region_type: u32,
}

impl FetchJob {
    /// Form fields posted for this job.
    pub fn form(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Date", format!("{} {}", self.date, self.time)),
            ("type", self.region_type.to_string()),
        ]
    }
}
