use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::time::Duration;

use facet::Facet;
use facet_kv::{self as kv, KvPair};
use facet_testhelpers::test;

fn pairs(entries: &[(&str, &str)]) -> Vec<KvPair> {
    entries.iter().map(|&(k, v)| KvPair::new(k, v)).collect()
}

#[derive(Facet, Debug, Clone, PartialEq, Default)]
struct Record {
    field1: String,
    field2: String,
}

#[derive(Facet, Debug, PartialEq)]
#[facet(auto_traits)]
struct Colon {
    left: String,
    right: String,
}

#[derive(Debug)]
struct ColonError(String);

impl fmt::Display for ColonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected `left:right`, got {:?}", self.0)
    }
}

impl std::error::Error for ColonError {}

impl FromStr for Colon {
    type Err = ColonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (left, right) = s.split_once(':').ok_or_else(|| ColonError(s.into()))?;
        Ok(Colon {
            left: left.into(),
            right: right.into(),
        })
    }
}

#[derive(Facet, Debug)]
struct Level1 {
    uint: u64,
    int: i64,
    level2: Option<Box<Level2>>,
}

#[derive(Facet, Debug)]
struct Level2 {
    uint: u64,
    int: i64,
    level3: Option<Box<Level3>>,
}

#[derive(Facet, Debug)]
struct Level3 {
    uint: u32,
    int: i32,
}

#[derive(Facet, Debug)]
struct JsonValue {
    field1: String,
    field2: HashMap<String, String>,
}

#[derive(Facet, Debug)]
struct JsonHolder {
    string: String,
    #[facet(kv::tag = "Value,json")]
    value: JsonValue,
}

#[derive(Facet, Debug)]
struct Reused {
    field: String,
}

#[derive(Facet, Debug)]
struct Reuses {
    s1: Reused,
    s2: Reused,
}

#[derive(Facet, Debug)]
struct Everything {
    #[facet(kv::rename = "testInlineArray")]
    inline: Vec<Box<Record>>,
    #[facet(kv::rename = "testInlineArray2")]
    inline2: Option<Vec<Box<Record>>>,
    #[facet(kv::rename = "testMapStringStruct")]
    map_of_records: HashMap<String, Box<Record>>,
    #[facet(kv::rename = "testMapStringString")]
    map_of_strings: BTreeMap<String, String>,

    #[facet(kv::tag = "testslicestring,json")]
    json_list: Vec<String>,
    #[facet(kv::rename = "testbyteslice")]
    bytes: Vec<u8>,
    duration: Duration,
    ipv4: IpAddr,
    ipv6: IpAddr,
    #[facet(kv::rename = "testMask")]
    mask: kv::IpMask,
    #[facet(kv::rename = "im/several/levels/deep/testnestedvalue")]
    nested_value: String,

    #[facet(kv::rename = "testtextunmarshaler")]
    text: Option<Colon>,
    #[facet(kv::rename = "testbool")]
    flag: bool,

    l1: Option<Box<Level1>>,

    notag: String,
    #[facet(kv::tag = "-")]
    ignoreme: String,
    im_special: String,

    #[facet(kv::tag = "testspacesepstr,ssv")]
    space_str: Vec<String>,
    #[facet(kv::tag = "testcommasepstr,csv")]
    comma_str: Option<Vec<Box<String>>>,
    #[facet(kv::tag = "testspacesepint,ssv")]
    space_int: Vec<i64>,
    #[facet(kv::rename = "testcommasepint", kv::csv)]
    comma_int: Vec<i32>,

    #[facet(kv::rename = "testJsonStruct")]
    json_struct: JsonHolder,

    #[facet(kv::rename = "testReusesStruct")]
    reuses: Reuses,
}

fn special_resolver(field: &str, tag: &str) -> String {
    if field == "im_special" {
        "im-special".into()
    } else {
        kv::default_name_resolver(field, tag)
    }
}

#[test]
fn decodes_a_full_store_listing() {
    let store = kv::MemoryStore::from_pairs([
        ("testing/", ""),
        ("testing/notag", "i should exist"),
        ("testing/ignoreme", "i should not exist"),
        ("testing/im-special", "super duper special"),
        ("testing/testslicestring", r#"["foo","bar","baz"]"#),
        ("testing/testbyteslice", "raw"),
        ("testing/testInlineArray/one/field1", "field1rec1"),
        ("testing/testInlineArray/one/field2", "field2rec1"),
        ("testing/testInlineArray/two/field1", "field1rec2"),
        ("testing/testInlineArray/two/field2", "field2rec2"),
        ("testing/testInlineArray2/one/field1", "field1p2rec1"),
        ("testing/testInlineArray2/one/field2", "field2p2rec1"),
        ("testing/testInlineArray2/two/field1", "field1p2rec2"),
        ("testing/testInlineArray2/two/field2", "field2p2rec2"),
        ("testing/testMapStringStruct/key1/field1", "msskey1field1val"),
        ("testing/testMapStringStruct/key1/field2", "msskey1field2val"),
        ("testing/testMapStringStruct/key2/field1", "msskey2field1val"),
        ("testing/testMapStringStruct/key2/field2", "msskey2field2val"),
        ("testing/testMapStringStruct/key3/field1", "msskey3field1val"),
        ("testing/testMapStringStruct/key3/field2", "msskey3field2val"),
        ("testing/testmapstringstring/key1", "value1"),
        ("testing/testmapstringstring/key2", "value2"),
        ("testing/testtextunmarshaler", "val1:val2"),
        ("testing/duration", "30s"),
        ("testing/ipv4", "1.2.3.4"),
        ("testing/ipv6", "::1"),
        ("testing/testMask", "255.255.255.0"),
        ("testing/im/several/levels/deep/testnestedvalue", "nestisthebest"),
        ("testing/testbool", "true"),
        ("testing/l1/uint", "1"),
        ("testing/l1/int", "-2"),
        ("testing/l1/level2/uint", "3"),
        ("testing/l1/level2/int", "-4"),
        ("testing/l1/level2/level3/uint", "5"),
        ("testing/l1/level2/level3/int", "-6"),
        ("testing/testspacesepstr", "one two three"),
        (
            "testing/testcommasepstr",
            r#""three, with embedded comma ""and quotes""",four,five"#,
        ),
        ("testing/testspacesepint", "1 2 3"),
        ("testing/testcommasepint", "6,7,8"),
        ("testing/testJsonStruct/string", "string"),
        (
            "testing/testJsonStruct/Value",
            r#"{"field1":"value","field2":{"map1":"value1","map2":"value2"}}"#,
        ),
        ("testing/testReusesStruct/s1/field", "value1"),
        ("testing/testReusesStruct/s2/field", "value2"),
        ("elsewhere/notag", "not mine"),
    ]);

    let decoder = kv::builder().name_resolver(special_resolver).build();
    let got: Everything = decoder.decode_source(&store, "testing").unwrap();

    assert_eq!(got.ignoreme, "");
    assert_eq!(got.im_special, "super duper special");
    assert_eq!(got.notag, "i should exist");
    assert_eq!(got.json_list, ["foo", "bar", "baz"]);
    assert_eq!(got.bytes, b"raw");

    assert_eq!(got.map_of_strings.len(), 2);
    assert_eq!(got.map_of_strings["key1"], "value1");
    assert_eq!(got.map_of_strings["key2"], "value2");

    assert_eq!(got.inline.len(), 2);
    assert_eq!(got.inline[0].field1, "field1rec1");
    assert_eq!(got.inline[0].field2, "field2rec1");
    assert_eq!(got.inline[1].field1, "field1rec2");
    assert_eq!(got.inline[1].field2, "field2rec2");

    let inline2 = got.inline2.as_ref().unwrap();
    assert_eq!(inline2.len(), 2);
    assert_eq!(inline2[0].field1, "field1p2rec1");
    assert_eq!(inline2[1].field2, "field2p2rec2");

    assert_eq!(got.map_of_records.len(), 3);
    assert_eq!(got.map_of_records["key1"].field1, "msskey1field1val");
    assert_eq!(got.map_of_records["key2"].field2, "msskey2field2val");
    assert_eq!(got.map_of_records["key3"].field1, "msskey3field1val");

    let text = got.text.as_ref().unwrap();
    assert_eq!(text.left, "val1");
    assert_eq!(text.right, "val2");

    assert_eq!(got.duration, Duration::from_secs(30));
    assert!(got.flag);
    assert_eq!(got.ipv4, IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)));
    assert_eq!(got.ipv6, IpAddr::V6(Ipv6Addr::LOCALHOST));
    assert_eq!(got.mask.prefix_len(), Some(24));
    assert_eq!(got.nested_value, "nestisthebest");

    let l1 = got.l1.as_ref().unwrap();
    assert_eq!(l1.uint, 1);
    assert_eq!(l1.int, -2);
    let l2 = l1.level2.as_ref().unwrap();
    assert_eq!(l2.uint, 3);
    assert_eq!(l2.int, -4);
    let l3 = l2.level3.as_ref().unwrap();
    assert_eq!(l3.uint, 5);
    assert_eq!(l3.int, -6);

    assert_eq!(got.space_str, ["one", "two", "three"]);
    let comma_str = got.comma_str.as_ref().unwrap();
    assert_eq!(comma_str.len(), 3);
    assert_eq!(*comma_str[0], r#"three, with embedded comma "and quotes""#);
    assert_eq!(*comma_str[2], "five");
    assert_eq!(got.space_int, [1, 2, 3]);
    assert_eq!(got.comma_int, [6, 7, 8]);

    assert_eq!(got.json_struct.string, "string");
    assert_eq!(got.json_struct.value.field1, "value");
    assert_eq!(got.json_struct.value.field2["map2"], "value2");

    assert_eq!(got.reuses.s1.field, "value1");
    assert_eq!(got.reuses.s2.field, "value2");
}

#[test]
fn optional_nested_record_scenario() {
    #[derive(Facet, Debug)]
    struct Inner {
        #[facet(kv::rename = "x")]
        x: i64,
    }

    #[derive(Facet, Debug)]
    struct Outer {
        #[facet(kv::rename = "inner")]
        inner: Option<Box<Inner>>,
    }

    let outer: Outer = kv::from_pairs("", &pairs(&[("inner/x", "42")])).unwrap();
    assert_eq!(outer.inner.unwrap().x, 42);
}

#[test]
fn nested_path_names_match_exactly() {
    #[derive(Facet, Debug)]
    struct Deep {
        #[facet(kv::rename = "a/b/c")]
        value: String,
    }

    let deep: Deep = kv::from_pairs(
        "app",
        &pairs(&[("app/a/b/c", "X"), ("app/a/b/c/d", "Y")]),
    )
    .unwrap();
    assert_eq!(deep.value, "X");

    let deep: Deep = kv::from_pairs("app", &pairs(&[("app/a/b/c/d", "Y")])).unwrap();
    assert_eq!(deep.value, "");
}

#[test]
fn sequence_elements_keep_arrival_order() {
    #[derive(Facet, Debug)]
    struct Holder {
        testarr: Vec<Record>,
    }

    let holder: Holder = kv::from_pairs(
        "p",
        &pairs(&[
            ("p/testarr/2/field1", "v2"),
            ("p/testarr/1/field1", "v1"),
        ]),
    )
    .unwrap();
    let firsts: Vec<_> = holder.testarr.iter().map(|r| r.field1.as_str()).collect();
    assert_eq!(firsts, ["v2", "v1"]);
}

#[test]
fn non_contiguous_groups_become_separate_elements() {
    #[derive(Facet, Debug)]
    struct Holder {
        items: Vec<Record>,
        name: String,
    }

    let holder: Holder = kv::from_pairs(
        "",
        &pairs(&[
            ("items/a/field1", "first"),
            ("name", "between"),
            ("items/a/field2", "second"),
        ]),
    )
    .unwrap();
    assert_eq!(holder.name, "between");
    assert_eq!(holder.items.len(), 2);
    assert_eq!(holder.items[0].field1, "first");
    assert_eq!(holder.items[0].field2, "");
    assert_eq!(holder.items[1].field2, "second");
}

#[test]
fn keys_match_case_insensitively_by_default() {
    #[derive(Facet, Debug)]
    #[allow(non_snake_case)]
    struct Named {
        Name: String,
    }

    let named: Named = kv::from_pairs("Svc", &pairs(&[("svc/NAME", "upper")])).unwrap();
    assert_eq!(named.Name, "upper");

    let named: Named = kv::from_pairs("svc", &pairs(&[("SVC/name", "lower")])).unwrap();
    assert_eq!(named.Name, "lower");
}

#[test]
fn case_sensitive_decoder_requires_exact_keys() {
    #[derive(Facet, Debug)]
    #[allow(non_snake_case)]
    struct Named {
        Name: String,
    }

    let decoder = kv::builder().case_sensitive(true).build();
    let named: Named = decoder
        .decode("svc", &pairs(&[("svc/name", "lower"), ("svc/NAME", "upper")]))
        .unwrap();
    assert_eq!(named.Name, "");

    let named: Named = decoder
        .decode("svc", &pairs(&[("svc/Name", "exact")]))
        .unwrap();
    assert_eq!(named.Name, "exact");
}

#[test]
fn delimited_lists() {
    #[derive(Facet, Debug)]
    struct Lists {
        #[facet(kv::csv)]
        plain: Vec<String>,
        #[facet(kv::csv)]
        quoted: Vec<String>,
        #[facet(kv::ssv)]
        spaced: Vec<String>,
        #[facet(kv::ssv)]
        durations: Vec<Duration>,
        #[facet(kv::csv)]
        empty: Vec<u16>,
    }

    let lists: Lists = kv::from_pairs(
        "",
        &pairs(&[
            ("plain", "a,b,c"),
            ("quoted", r#""x, y",z"#),
            ("spaced", "1 2  3"),
            ("durations", "1s 250ms"),
            ("empty", ""),
        ]),
    )
    .unwrap();
    assert_eq!(lists.plain, ["a", "b", "c"]);
    assert_eq!(lists.quoted, ["x, y", "z"]);
    assert_eq!(lists.spaced, ["1", "2", "3"]);
    assert_eq!(
        lists.durations,
        [Duration::from_secs(1), Duration::from_millis(250)]
    );
    assert!(lists.empty.is_empty());
}

#[test]
fn delimited_values_append_across_pairs() {
    #[derive(Facet, Debug)]
    struct Ports {
        #[facet(kv::csv)]
        ports: Vec<u16>,
    }

    let ports: Ports = kv::from_pairs(
        "",
        &pairs(&[("ports", "80,443"), ("ports", ""), ("ports", "8080")]),
    )
    .unwrap();
    assert_eq!(ports.ports, [80, 443, 8080]);
}

#[test]
fn skipped_fields_are_never_touched() {
    #[derive(Facet, Debug)]
    struct Secrets {
        #[facet(kv::tag = "-")]
        tagged: String,
        #[facet(kv::rename = "-")]
        renamed: String,
        #[facet(kv::skip)]
        marked: String,
        kept: String,
    }

    let decoder = kv::Decoder::default();
    let meta = decoder.type_meta::<Secrets>().unwrap();
    assert_eq!(meta.names().collect::<Vec<_>>(), ["kept"]);

    let secrets: Secrets = decoder
        .decode(
            "",
            &pairs(&[
                ("tagged", "x"),
                ("-", "x"),
                ("renamed", "x"),
                ("marked", "x"),
                ("kept", "y"),
            ]),
        )
        .unwrap();
    assert_eq!(secrets.tagged, "");
    assert_eq!(secrets.renamed, "");
    assert_eq!(secrets.marked, "");
    assert_eq!(secrets.kept, "y");
}

#[test]
fn optional_records_are_allocated_only_when_set() {
    #[derive(Facet, Debug)]
    struct Limits {
        max: u32,
        min: Option<u32>,
        label: String,
    }

    #[derive(Facet, Debug)]
    struct Service {
        name: String,
        limits: Option<Box<Limits>>,
    }

    let service: Service = kv::from_pairs("svc", &pairs(&[("svc/name", "web")])).unwrap();
    assert_eq!(service.name, "web");
    assert!(service.limits.is_none());

    let service: Service =
        kv::from_pairs("svc", &pairs(&[("svc/limits/max", "10")])).unwrap();
    let limits = service.limits.unwrap();
    assert_eq!(limits.max, 10);
    assert_eq!(limits.min, None);
    assert_eq!(limits.label, "");
}

#[test]
fn later_pairs_replace_earlier_values() {
    #[derive(Facet, Debug)]
    struct Single {
        value: u8,
    }

    let single: Single =
        kv::from_pairs("", &pairs(&[("value", "1"), ("value", "2")])).unwrap();
    assert_eq!(single.value, 2);
}

#[test]
fn scalar_sequences_and_maps_from_keys() {
    #[derive(Facet, Debug)]
    struct Tags {
        tags: Vec<String>,
        weights: HashMap<String, f64>,
        flags: BTreeMap<String, Option<bool>>,
    }

    let tags: Tags = kv::from_pairs(
        "t",
        &pairs(&[
            ("t/tags/0", "alpha"),
            ("t/tags/1", "beta"),
            ("t/tags", "gamma"),
            ("t/weights/Heavy", "2.5"),
            ("t/weights/light", "0.5"),
            ("t/weights", "ignored: no entry segment"),
            ("t/flags/on", "true"),
        ]),
    )
    .unwrap();
    assert_eq!(tags.tags, ["alpha", "beta", "gamma"]);
    assert_eq!(tags.weights.len(), 2);
    assert_eq!(tags.weights["heavy"], 2.5);
    assert_eq!(tags.weights["light"], 0.5);
    assert_eq!(tags.flags["on"], Some(true));
}

#[test]
fn map_entries_are_replaced_by_later_groups() {
    #[derive(Facet, Debug)]
    struct Holder {
        records: HashMap<String, Record>,
    }

    let holder: Holder = kv::from_pairs(
        "",
        &pairs(&[
            ("records/a/field1", "old"),
            ("records/b/field1", "b"),
            ("records/a/field2", "new"),
        ]),
    )
    .unwrap();
    assert_eq!(holder.records.len(), 2);
    assert_eq!(holder.records["a"].field1, "");
    assert_eq!(holder.records["a"].field2, "new");
    assert_eq!(holder.records["b"].field1, "b");
}

#[test]
fn containers_inside_flattened_records_use_the_full_path() {
    #[derive(Facet, Debug)]
    struct Pool {
        members: Vec<Record>,
    }

    #[derive(Facet, Debug)]
    struct Cluster {
        pool: Pool,
    }

    let cluster: Cluster = kv::from_pairs(
        "c",
        &pairs(&[
            ("c/pool/members/0/field1", "m0"),
            ("c/pool/members/1/field1", "m1"),
        ]),
    )
    .unwrap();
    let names: Vec<_> = cluster.pool.members.iter().map(|m| m.field1.as_str()).collect();
    assert_eq!(names, ["m0", "m1"]);
}

#[test]
fn text_capable_elements() {
    #[derive(Facet, Debug)]
    struct Routes {
        #[facet(kv::ssv)]
        initials: Vec<char>,
        list: Vec<Colon>,
        by_name: HashMap<String, Colon>,
        initial: char,
    }

    let routes: Routes = kv::from_pairs(
        "",
        &pairs(&[
            ("initials", "x y"),
            ("list/0", "a:1"),
            ("list/1", "b:2"),
            ("by_name/web", "web:80"),
            ("initial", "z"),
        ]),
    )
    .unwrap();
    assert_eq!(routes.initials, ['x', 'y']);
    assert_eq!(routes.list.len(), 2);
    assert_eq!(routes.list[1].left, "b");
    assert_eq!(routes.by_name["web"].right, "80");
    assert_eq!(routes.initial, 'z');
}

#[test]
fn intrinsic_values_and_zero_values() {
    #[derive(Facet, Debug)]
    struct Net {
        addr: IpAddr,
        v4: Ipv4Addr,
        v6: Ipv6Addr,
        mask: kv::IpMask,
        timeout: Duration,
        raw: Vec<u8>,
        missing_addr: IpAddr,
        missing_timeout: Duration,
    }

    let net: Net = kv::from_pairs(
        "",
        &[
            KvPair::new("addr", "10.1.2.3"),
            KvPair::new("v4", "192.168.0.1"),
            KvPair::new("v6", ""),
            KvPair::new("mask", "ffff:ffff::"),
            KvPair::new("timeout", "1m30s"),
            KvPair::new("raw", vec![0xde, 0xad, 0xbe, 0xef]),
        ],
    )
    .unwrap();
    assert_eq!(net.addr, IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)));
    assert_eq!(net.v4, Ipv4Addr::new(192, 168, 0, 1));
    assert_eq!(net.v6, Ipv6Addr::UNSPECIFIED);
    assert_eq!(net.mask.prefix_len(), Some(32));
    assert_eq!(net.timeout, Duration::from_secs(90));
    assert_eq!(net.raw, [0xde, 0xad, 0xbe, 0xef]);
    assert_eq!(net.missing_addr, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    assert_eq!(net.missing_timeout, Duration::ZERO);
}

#[test]
fn directory_markers_and_foreign_keys_are_ignored() {
    #[derive(Facet, Debug)]
    struct App {
        name: String,
    }

    let app: App = kv::from_pairs(
        "app",
        &pairs(&[
            ("app/", ""),
            ("app/name/", "marker"),
            ("application/name", "other tree"),
            ("app/unknown/key", "nobody"),
            ("app/name", "mine"),
        ]),
    )
    .unwrap();
    assert_eq!(app.name, "mine");
}

#[test]
fn empty_prefix_covers_every_key() {
    #[derive(Facet, Debug)]
    struct Root {
        a: u8,
        b: u8,
    }

    let root: Root = kv::from_pairs("", &pairs(&[("a", "1"), ("b", "2")])).unwrap();
    assert_eq!((root.a, root.b), (1, 2));

    let root: Root = kv::from_pairs("/", &pairs(&[("/a", "3")])).unwrap();
    assert_eq!(root.a, 3);
}

#[test]
fn unmarshal_updates_the_target_in_place() {
    #[derive(Facet, Debug, Clone)]
    struct Settings {
        host: String,
        port: u16,
        tags: Vec<String>,
        weights: HashMap<String, u8>,
    }

    let mut settings = Settings {
        host: "old".into(),
        port: 8500,
        tags: vec!["a".into()],
        weights: HashMap::from([("x".into(), 1), ("y".into(), 2)]),
    };
    kv::unmarshal(
        "s",
        &pairs(&[
            ("s/host", "new"),
            ("s/tags/0", "b"),
            ("s/weights/y", "20"),
            ("s/weights/z", "3"),
        ]),
        &mut settings,
    )
    .unwrap();
    assert_eq!(settings.host, "new");
    assert_eq!(settings.port, 8500);
    assert_eq!(settings.tags, ["a", "b"]);
    assert_eq!(settings.weights.len(), 3);
    assert_eq!(settings.weights["x"], 1);
    assert_eq!(settings.weights["y"], 20);
    assert_eq!(settings.weights["z"], 3);
}

#[test]
fn unmarshal_reuses_existing_layers() {
    #[derive(Facet, Debug, Clone)]
    struct Limits {
        max: u32,
        label: String,
    }

    #[derive(Facet, Debug, Clone)]
    struct Service {
        limits: Option<Box<Limits>>,
        spare: Option<Box<Limits>>,
        aliases: Option<Vec<String>>,
    }

    let mut service = Service {
        limits: Some(Box::new(Limits {
            max: 10,
            label: "keep me".into(),
        })),
        spare: None,
        aliases: Some(vec!["www".into()]),
    };
    kv::unmarshal(
        "svc",
        &pairs(&[
            ("svc/limits/max", "20"),
            ("svc/spare/max", "5"),
            ("svc/aliases/0", "static"),
        ]),
        &mut service,
    )
    .unwrap();

    let limits = service.limits.as_deref().unwrap();
    assert_eq!(limits.max, 20);
    assert_eq!(limits.label, "keep me");
    let spare = service.spare.as_deref().unwrap();
    assert_eq!(spare.max, 5);
    assert_eq!(spare.label, "");
    assert_eq!(service.aliases.unwrap(), ["www", "static"]);
}

#[test]
fn unmarshal_keeps_skipped_fields() {
    #[derive(Facet, Debug, Clone, PartialEq)]
    #[repr(u8)]
    enum Mode {
        A,
        B,
    }

    #[derive(Facet, Debug, Clone)]
    struct Panel {
        title: String,
        #[facet(kv::skip)]
        mode: Mode,
        state: Mode,
    }

    let mut panel = Panel {
        title: "old".into(),
        mode: Mode::B,
        state: Mode::A,
    };
    kv::unmarshal(
        "",
        &pairs(&[("title", "new"), ("mode", "A"), ("state", "B")]),
        &mut panel,
    )
    .unwrap();
    assert_eq!(panel.title, "new");
    assert_eq!(panel.mode, Mode::B);
    assert_eq!(panel.state, Mode::A);
}

#[test]
fn unmarshal_leaves_target_alone_on_error() {
    #[derive(Facet, Debug, Clone)]
    struct Settings {
        host: String,
        port: u16,
        tags: Vec<String>,
    }

    let mut settings = Settings {
        host: "old".into(),
        port: 1,
        tags: vec!["a".into()],
    };
    let result = kv::unmarshal(
        "s",
        &pairs(&[("s/host", "new"), ("s/tags/0", "b"), ("s/port", "not a port")]),
        &mut settings,
    );
    assert!(result.is_err());
    assert_eq!(settings.host, "old");
    assert_eq!(settings.port, 1);
    assert_eq!(settings.tags, ["a"]);
}

#[test]
fn fields_without_a_zero_value_come_from_the_record_default() {
    #[derive(Facet, Debug, PartialEq)]
    #[repr(u8)]
    enum Color {
        Red,
        Blue,
    }

    #[derive(Facet, Debug)]
    #[facet(traits(Default))]
    struct Palette {
        name: String,
        color: Color,
        #[facet(kv::skip)]
        accent: Color,
        size: u8,
    }

    impl Default for Palette {
        fn default() -> Self {
            Palette {
                name: "unnamed".into(),
                color: Color::Blue,
                accent: Color::Red,
                size: 3,
            }
        }
    }

    let palette: Palette = kv::from_pairs("", &pairs(&[("name", "x"), ("color", "Red")])).unwrap();
    assert_eq!(palette.name, "x");
    assert_eq!(palette.color, Color::Blue);
    assert_eq!(palette.accent, Color::Red);
    assert_eq!(palette.size, 3);

    #[derive(Facet, Debug)]
    struct Bare {
        name: String,
        color: Color,
    }

    let err = kv::from_pairs::<Bare>("", &pairs(&[("name", "x")])).unwrap_err();
    assert!(matches!(
        err.kind,
        kv::DecodeErrorKind::MissingValue { field: "color", .. }
    ));
}

#[test]
fn map_keys_are_folded_unless_case_sensitive() {
    #[derive(Facet, Debug)]
    struct Weights {
        weights: HashMap<String, u8>,
        groups: BTreeMap<String, Record>,
    }

    let entries = pairs(&[
        ("w/weights/Heavy", "9"),
        ("w/groups/Blue/field1", "b"),
        ("w/groups/blue/field2", "c"),
    ]);

    let folded: Weights = kv::from_pairs("w", &entries).unwrap();
    assert_eq!(folded.weights.len(), 1);
    assert_eq!(folded.weights["heavy"], 9);
    assert_eq!(folded.groups.len(), 1);
    assert_eq!(folded.groups["blue"].field1, "b");
    assert_eq!(folded.groups["blue"].field2, "c");

    let exact: Weights = kv::builder()
        .case_sensitive(true)
        .build()
        .decode("w", &entries)
        .unwrap();
    assert_eq!(exact.weights.len(), 1);
    assert_eq!(exact.weights["Heavy"], 9);
    assert_eq!(exact.groups.len(), 2);
    assert_eq!(exact.groups["Blue"].field1, "b");
    assert_eq!(exact.groups["blue"].field2, "c");
}

#[test]
fn dash_tag_is_left_to_the_resolver() {
    #[derive(Facet, Debug)]
    struct Legacy {
        #[facet(kv::tag = "-")]
        hidden: u32,
        shown: u32,
    }

    fn legacy_resolver(field: &str, tag: &str) -> String {
        if tag == "-" {
            format!("legacy/{field}")
        } else {
            kv::default_name_resolver(field, tag)
        }
    }

    let entries = pairs(&[("legacy/hidden", "7"), ("hidden", "8"), ("shown", "1")]);

    let default: Legacy = kv::from_pairs("", &entries).unwrap();
    assert_eq!(default.hidden, 0);
    assert_eq!(default.shown, 1);

    let decoder = kv::builder().name_resolver(legacy_resolver).build();
    let meta = decoder.type_meta::<Legacy>().unwrap();
    assert_eq!(meta.names().collect::<Vec<_>>(), ["legacy/hidden", "shown"]);
    let custom: Legacy = decoder.decode("", &entries).unwrap();
    assert_eq!(custom.hidden, 7);
    assert_eq!(custom.shown, 1);
}

#[test]
fn custom_defaults_are_honored() {
    #[derive(Facet, Debug)]
    struct Pool {
        #[facet(default = 8)]
        size: u32,
        name: String,
    }

    let pool: Pool = kv::from_pairs("", &pairs(&[("name", "p")])).unwrap();
    assert_eq!(pool.size, 8);
    assert_eq!(pool.name, "p");
}
