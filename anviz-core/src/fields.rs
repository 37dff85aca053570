//! Payload layouts and typed decoders
//!
//! Each payload kind has a `static` [`Layout`] table in its own module and a
//! pair of decode/encode functions built on it.

use std::net::Ipv4Addr;

use anviz_types::{
    BackupType, Direction, MacAddress, NetParams, Record, RecordsInfo, StaffInfo,
    staff::NAME_WIDTH,
};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::{
    constants::{CLOCK_BASE_YEAR, RECORD_EPOCH_UNIX},
    error::{Error, Result, Violation},
    layout::{Field, Layout},
};

/// Attendance record, 14 bytes
pub mod record {
    use super::*;

    pub const CODE: Field = Field::be("code", 0, 5);
    pub const SECONDS: Field = Field::be("seconds", 5, 4);
    pub const BACKUP: Field = Field::be("backup", 9, 1);
    pub const DIRECTION: Field = Field::be("direction", 10, 1);
    pub const WORK: Field = Field::be("work", 11, 3);

    pub static LAYOUT: Layout = Layout {
        name: "record",
        size: 14,
        fields: &[CODE, SECONDS, BACKUP, DIRECTION, WORK],
    };
}

/// Staff entry, 27 bytes
pub mod staff {
    use super::*;

    pub const CODE: Field = Field::be("code", 0, 5);
    pub const PASSWORD: Field = Field::be("password", 5, 3).optional();
    pub const CARD: Field = Field::be("card", 8, 3).optional();
    pub const NAME: Field = Field::be("name", 11, NAME_WIDTH);
    pub const DEPARTMENT: Field = Field::be("department", 21, 1);
    pub const GROUP: Field = Field::be("group", 22, 1);
    pub const MODE: Field = Field::be("mode", 23, 1);
    // Only field in the layout the firmware stores in host order
    pub const FINGERPRINTS: Field = Field::le("fingerprints", 24, 2);
    pub const SPECIAL: Field = Field::be("special", 26, 1);

    pub static LAYOUT: Layout = Layout {
        name: "staff",
        size: 27,
        fields: &[
            CODE,
            PASSWORD,
            CARD,
            NAME,
            DEPARTMENT,
            GROUP,
            MODE,
            FINGERPRINTS,
            SPECIAL,
        ],
    };
}

/// TCP/IP parameters, 27 bytes
pub mod net {
    use super::*;

    pub const IP: Field = Field::be("ip", 0, 4);
    pub const NETMASK: Field = Field::be("netmask", 4, 4);
    pub const MAC: Field = Field::be("mac", 8, 6);
    pub const GATEWAY: Field = Field::be("gateway", 14, 4);
    pub const SERVER: Field = Field::be("server", 18, 4);
    pub const FAR: Field = Field::be("far", 22, 1);
    pub const COM: Field = Field::le("com", 23, 2);
    pub const MODE: Field = Field::be("mode", 25, 1);
    pub const DHCP: Field = Field::be("dhcp", 26, 1);

    pub static LAYOUT: Layout = Layout {
        name: "net_params",
        size: 27,
        fields: &[IP, NETMASK, MAC, GATEWAY, SERVER, FAR, COM, MODE, DHCP],
    };
}

/// Storage counters, six (u8 + u16) groups
pub mod records_info {
    use super::*;

    pub const USERS: (Field, Field) = (Field::be("users.hi", 0, 1), Field::be("users.lo", 1, 2));
    pub const FINGERPRINTS: (Field, Field) = (
        Field::be("fingerprints.hi", 3, 1),
        Field::be("fingerprints.lo", 4, 2),
    );
    pub const PASSWORDS: (Field, Field) = (
        Field::be("passwords.hi", 6, 1),
        Field::be("passwords.lo", 7, 2),
    );
    pub const CARDS: (Field, Field) = (Field::be("cards.hi", 9, 1), Field::be("cards.lo", 10, 2));
    pub const ALL_RECORDS: (Field, Field) = (
        Field::be("all_records.hi", 12, 1),
        Field::be("all_records.lo", 13, 2),
    );
    pub const NEW_RECORDS: (Field, Field) = (
        Field::be("new_records.hi", 15, 1),
        Field::be("new_records.lo", 16, 2),
    );

    pub static LAYOUT: Layout = Layout {
        name: "records_info",
        size: 18,
        fields: &[
            USERS.0,
            USERS.1,
            FINGERPRINTS.0,
            FINGERPRINTS.1,
            PASSWORDS.0,
            PASSWORDS.1,
            CARDS.0,
            CARDS.1,
            ALL_RECORDS.0,
            ALL_RECORDS.1,
            NEW_RECORDS.0,
            NEW_RECORDS.1,
        ],
    };
}

/// Device clock, six single bytes
pub mod clock {
    use super::*;

    pub const YEAR: Field = Field::be("year", 0, 1);
    pub const MONTH: Field = Field::be("month", 1, 1);
    pub const DAY: Field = Field::be("day", 2, 1);
    pub const HOUR: Field = Field::be("hour", 3, 1);
    pub const MINUTE: Field = Field::be("minute", 4, 1);
    pub const SECOND: Field = Field::be("second", 5, 1);

    pub static LAYOUT: Layout = Layout {
        name: "clock",
        size: 6,
        fields: &[YEAR, MONTH, DAY, HOUR, MINUTE, SECOND],
    };
}

/// Convert record seconds to a timestamp
pub fn record_time(seconds: u32) -> Result<NaiveDateTime> {
    DateTime::from_timestamp(RECORD_EPOCH_UNIX + i64::from(seconds), 0)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| {
            Violation::InvalidField {
                field: record::SECONDS.name,
                reason: format!("{seconds} seconds overflows the calendar"),
            }
            .into()
        })
}

/// Convert a timestamp to record seconds
pub fn record_seconds(datetime: NaiveDateTime) -> Result<u32> {
    u32::try_from(datetime.and_utc().timestamp() - RECORD_EPOCH_UNIX)
        .map_err(|_| Error::TimestampOutOfRange(datetime))
}

pub fn decode_record(entry: &[u8]) -> Result<Record> {
    use record::*;

    let fields = LAYOUT.read(entry)?;
    Ok(Record {
        code: fields.uint(&CODE)?,
        datetime: record_time(fields.u32(&SECONDS)?)?,
        backup: BackupType::from(fields.u8(&BACKUP)?),
        direction: Direction::from(fields.u8(&DIRECTION)?),
        work: fields.u32(&WORK)?,
    })
}

pub fn encode_record(value: &Record) -> Result<Vec<u8>> {
    use record::*;

    let mut writer = LAYOUT.writer();
    writer
        .uint(&CODE, value.code)?
        .uint(&SECONDS, u64::from(record_seconds(value.datetime)?))?
        .uint(&BACKUP, u64::from(u8::from(value.backup)))?
        .uint(&DIRECTION, u64::from(u8::from(value.direction)))?
        .uint(&WORK, u64::from(value.work))?;
    Ok(writer.finish())
}

pub fn decode_staff(entry: &[u8]) -> Result<StaffInfo> {
    use staff::*;

    let fields = LAYOUT.read(entry)?;
    let name = <[u8; NAME_WIDTH]>::try_from(fields.bytes(&NAME)?).map_err(|_| {
        Violation::InvalidField {
            field: NAME.name,
            reason: "wrong width".into(),
        }
    })?;
    let narrow = |value: Option<u64>, field: &Field| -> Result<Option<u32>> {
        value
            .map(|v| {
                u32::try_from(v).map_err(|_| {
                    Error::from(Violation::InvalidField {
                        field: field.name,
                        reason: format!("{v} out of range"),
                    })
                })
            })
            .transpose()
    };

    Ok(StaffInfo {
        code: fields.uint(&CODE)?,
        password: narrow(fields.optional(&PASSWORD)?, &PASSWORD)?,
        card: narrow(fields.optional(&CARD)?, &CARD)?,
        name,
        department: fields.u8(&DEPARTMENT)?,
        group: fields.u8(&GROUP)?,
        mode: fields.u8(&MODE)?,
        fingerprints: fields.u16(&FINGERPRINTS)?,
        special: fields.u8(&SPECIAL)?,
    })
}

pub fn encode_staff(value: &StaffInfo) -> Result<Vec<u8>> {
    use staff::*;

    let mut writer = LAYOUT.writer();
    writer
        .uint(&CODE, value.code)?
        .optional(&PASSWORD, value.password.map(u64::from))?
        .optional(&CARD, value.card.map(u64::from))?
        .bytes(&NAME, &value.name)?
        .uint(&DEPARTMENT, u64::from(value.department))?
        .uint(&GROUP, u64::from(value.group))?
        .uint(&MODE, u64::from(value.mode))?
        .uint(&FINGERPRINTS, u64::from(value.fingerprints))?
        .uint(&SPECIAL, u64::from(value.special))?;
    Ok(writer.finish())
}

pub fn decode_net_params(payload: &[u8]) -> Result<NetParams> {
    use net::*;

    let fields = LAYOUT.read(payload)?;
    let mac = <[u8; 6]>::try_from(fields.bytes(&MAC)?).map_err(|_| Violation::InvalidField {
        field: MAC.name,
        reason: "wrong width".into(),
    })?;

    Ok(NetParams {
        ip: Ipv4Addr::from(fields.u32(&IP)?),
        netmask: Ipv4Addr::from(fields.u32(&NETMASK)?),
        mac: MacAddress(mac),
        gateway: Ipv4Addr::from(fields.u32(&GATEWAY)?),
        server: Ipv4Addr::from(fields.u32(&SERVER)?),
        far: fields.u8(&FAR)?,
        com: fields.u16(&COM)?,
        mode: fields.u8(&MODE)?,
        dhcp: fields.u8(&DHCP)? != 0,
    })
}

pub fn encode_net_params(value: &NetParams) -> Result<Vec<u8>> {
    use net::*;

    let mut writer = LAYOUT.writer();
    writer
        .uint(&IP, u64::from(u32::from(value.ip)))?
        .uint(&NETMASK, u64::from(u32::from(value.netmask)))?
        .bytes(&MAC, &value.mac.0)?
        .uint(&GATEWAY, u64::from(u32::from(value.gateway)))?
        .uint(&SERVER, u64::from(u32::from(value.server)))?
        .uint(&FAR, u64::from(value.far))?
        .uint(&COM, u64::from(value.com))?
        .uint(&MODE, u64::from(value.mode))?
        .uint(&DHCP, u64::from(value.dhcp))?;
    Ok(writer.finish())
}

pub fn decode_records_info(payload: &[u8]) -> Result<RecordsInfo> {
    use records_info::*;

    let fields = LAYOUT.read(payload)?;
    let total = |(hi, lo): (Field, Field)| -> Result<u32> {
        Ok(u32::from(fields.u8(&hi)?) + u32::from(fields.u16(&lo)?))
    };

    Ok(RecordsInfo {
        users: total(USERS)?,
        fingerprints: total(FINGERPRINTS)?,
        passwords: total(PASSWORDS)?,
        cards: total(CARDS)?,
        all_records: total(ALL_RECORDS)?,
        new_records: total(NEW_RECORDS)?,
    })
}

pub fn decode_clock(payload: &[u8]) -> Result<NaiveDateTime> {
    use clock::*;

    let fields = LAYOUT.read(payload)?;
    let year = CLOCK_BASE_YEAR + i32::from(fields.u8(&YEAR)?);
    let month = u32::from(fields.u8(&MONTH)?);
    let day = u32::from(fields.u8(&DAY)?);
    let (hour, minute, second) = (
        u32::from(fields.u8(&HOUR)?),
        u32::from(fields.u8(&MINUTE)?),
        u32::from(fields.u8(&SECOND)?),
    );

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .ok_or_else(|| {
            Violation::InvalidField {
                field: LAYOUT.name,
                reason: format!(
                    "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02} is not a valid time"
                ),
            }
            .into()
        })
}

pub fn encode_clock(datetime: NaiveDateTime) -> Result<Vec<u8>> {
    use clock::*;

    let year = u64::try_from(datetime.year() - CLOCK_BASE_YEAR)
        .map_err(|_| Error::TimestampOutOfRange(datetime))?;
    if year > YEAR.max_value() {
        return Err(Error::TimestampOutOfRange(datetime));
    }

    let mut writer = LAYOUT.writer();
    writer
        .uint(&YEAR, year)?
        .uint(&MONTH, u64::from(datetime.month()))?
        .uint(&DAY, u64::from(datetime.day()))?
        .uint(&HOUR, u64::from(datetime.hour()))?
        .uint(&MINUTE, u64::from(datetime.minute()))?
        .uint(&SECOND, u64::from(datetime.second()))?;
    Ok(writer.finish())
}

/// Decode a count-prefixed chunk of fixed-width entries
///
/// The payload must hold exactly the declared number of entries.
pub fn decode_entries<T>(
    payload: &[u8],
    layout: &'static Layout,
    decode: impl Fn(&[u8]) -> Result<T>,
) -> Result<Vec<T>> {
    let (&count, entries) = payload.split_first().ok_or(Violation::FrameTooShort {
        expected: 1,
        actual: 0,
    })?;

    let declared = usize::from(count);
    if entries.len() != declared * layout.size {
        return Err(Violation::EntryCountMismatch {
            declared,
            entry_size: layout.size,
            available: entries.len(),
        }
        .into());
    }

    entries.chunks_exact(layout.size).map(decode).collect()
}

/// Build a count-prefixed chunk
pub fn encode_entries<T>(
    items: &[T],
    encode: impl Fn(&T) -> Result<Vec<u8>>,
) -> Result<Vec<u8>> {
    let count = u8::try_from(items.len()).map_err(|_| Error::FieldOverflow {
        field: "count",
        value: items.len() as u64,
        width: 1,
    })?;

    let mut payload = vec![count];
    for item in items {
        payload.extend(encode(item)?);
    }
    Ok(payload)
}

pub fn decode_records(payload: &[u8]) -> Result<Vec<Record>> {
    decode_entries(payload, &record::LAYOUT, decode_record)
}

pub fn decode_staff_entries(payload: &[u8]) -> Result<Vec<StaffInfo>> {
    decode_entries(payload, &staff::LAYOUT, decode_staff)
}

/// Number of marks reported by a clear-records response (≤ 4 bytes, BE)
pub fn decode_cleared(payload: &[u8]) -> Result<u32> {
    if payload.len() > 4 {
        return Err(Violation::LengthMismatch {
            declared: 4,
            actual: payload.len(),
        }
        .into());
    }
    Ok(payload
        .iter()
        .fold(0u32, |acc, &b| (acc << 8) | u32::from(b)))
}
