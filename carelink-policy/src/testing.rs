//! Shared policy fixtures for tests and benchmarks across the workspace.

use crate::doc::PolicyDoc;
use crate::snapshot::PolicySnapshot;

/// A small but complete policy document exercising every section.
#[must_use]
pub fn sample_yaml() -> &'static str {
    r#"
version: 3
wakewords:
  - {language: zh, pattern: "小陪|小伴"}
  - {language: en, pattern: "hey companion"}
attention_window_secs: 120
sos_sets:
  - language: zh
    category: medical
    severity: 4
    phrases: ["救命", "不舒服", "心脏疼"]
  - language: zh
    category: fall
    severity: 3
    phrases: ["摔倒", "起不来"]
  - language: en
    category: medical
    severity: 4
    phrases: ["help me", "chest pain"]
  - language: en
    category: fall
    severity: 3
    phrases: ["i fell", "fallen down"]
  - language: yue
    category: sos
    severity: 2
    phrases: ["救命呀"]
devices:
  living_room_light:
    room: living_room
    risk_level: 1
    allowed_actions: [on, off, brighten, dim]
    aliases:
      - {language: zh, pattern: "客厅的?灯"}
      - {language: en, pattern: "living ?room (?:lamp|light)"}
  bedroom_light:
    room: bedroom
    risk_level: 1
    allowed_actions: [on, off, brighten, dim]
    aliases:
      - {language: zh, pattern: "卧室的?灯"}
      - {language: en, pattern: "bedroom (?:lamp|light)"}
  front_door_lock:
    room: entrance
    risk_level: 4
    allowed_actions: [lock, unlock]
    aliases:
      - {language: zh, pattern: "大门"}
      - {language: en, pattern: "(?:front )?door"}
actions:
  on:
    patterns:
      - {language: zh, pattern: "打开|开"}
      - {language: en, pattern: "turn on|switch on"}
  off:
    patterns:
      - {language: zh, pattern: "关掉|关"}
      - {language: en, pattern: "turn off"}
  brighten:
    patterns:
      - {language: zh, pattern: "调亮|亮一点"}
      - {language: en, pattern: "brighten|turn up"}
  dim:
    patterns:
      - {language: zh, pattern: "调暗|暗一点"}
      - {language: en, pattern: "\\bdim\\b"}
  unlock:
    patterns:
      - {language: zh, pattern: "打开|开"}
      - {language: en, pattern: "unlock|open"}
  lock:
    patterns:
      - {language: zh, pattern: "锁上|锁"}
      - {language: en, pattern: "\\block\\b"}
motion:
  verbs:
    - {language: zh, pattern: "带我|扶我|陪我"}
    - {language: en, pattern: "take me|walk me"}
  targets:
    bedroom:
      patterns:
        - {language: zh, pattern: "卧室|房间"}
        - {language: en, pattern: "bedroom"}
    balcony:
      patterns:
        - {language: zh, pattern: "阳台"}
        - {language: en, pattern: "balcony"}
calling:
  verbs:
    - {language: zh, pattern: "打给|打电话|联系"}
    - {language: en, pattern: "\\bcall\\b|\\bphone\\b"}
contacts:
  - id: daughter
    name: 女儿
    role: family
    phone: "+8613800000000"
    email: daughter@example.com
    aliases:
      - {language: zh, pattern: "女儿"}
      - {language: en, pattern: "my daughter"}
  - id: caregiver
    name: 护工
    role: caregiver
    phone: "+8613800000001"
    sms: "+8613800000011"
  - id: doctor
    name: 医生
    role: doctor
    phone: "+8613800000002"
  - id: services
    name: 急救
    role: services
    phone: "120"
ladder:
  - {contact: daughter, ring_timeout_secs: 60}
  - {contact: caregiver, ring_timeout_secs: 60}
  - {contact: doctor, ring_timeout_secs: 90}
  - {contact: services, ring_timeout_secs: 90}
geo:
  zones:
    - id: home
      polygon: [[0, 0], [10, 0], [10, 10], [0, 10]]
    - id: entrance
      polygon: [[10, 4], [12, 4], [12, 6], [10, 6]]
    - id: outside_safe_zones
      polygon: [[12, 0], [100, 0], [100, 100], [12, 100]]
  constraints:
    - action: unlock
      denied_zones: [outside_safe_zones]
guard:
  banned_phrases: ["ignore previous instructions"]
  injection_patterns: ["(?i)system prompt", "(?i)you are now"]
  rate_limits:
    smart_home: {burst: 6, per_minute: 20}
    assist_move: {burst: 3, per_minute: 6}
    call: {burst: 3, per_minute: 10}
confirm:
  phrases:
    - {language: zh, pattern: "确认|好的|是的"}
    - {language: en, pattern: "confirm|yes"}
emergency:
  scene:
    - {device: living_room_light, action: on}
    - {device: bedroom_light, action: on}
  cameras: [living_room, bedroom]
"#
}

/// Parse [`sample_yaml`] into a document.
#[must_use]
pub fn sample_doc() -> PolicyDoc {
    serde_yaml_ng::from_str(sample_yaml()).expect("sample policy must parse")
}

/// Compile [`sample_yaml`] into a snapshot.
#[must_use]
pub fn sample_snapshot() -> PolicySnapshot {
    PolicySnapshot::from_doc(&sample_doc()).expect("sample policy must compile")
}
