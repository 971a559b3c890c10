use pretty_assertions::assert_eq;
use rstest::rstest;
use tinytmpl::{compile, Map, Template, Value};

fn basket() -> Map {
    let mut data = Map::new();
    data.insert("basket".into(), Value::from(vec!["Apple", "Banana", "Cherry"]));
    data
}

fn render(template: &str, data: Option<&Map>) -> String {
    compile(template).unwrap().render(data)
}

#[rstest]
#[case("{% if True %}IF{% else %}ELSE{% endif %}", "IF")]
#[case("{% if False %}IF{% else %}ELSE{% endif %}", "ELSE")]
#[case("{% if False %}IF{% elif True %}ELIF{% else %}ELSE{% endif %}", "ELIF")]
#[case("{% if False %}IF{% elif False %}ELIF{% else %}ELSE{% endif %}", "ELSE")]
#[case("{% if False %}IF{% elif False %}!!!{% elif True %}ELIF{% else %}ELSE{% endif %}", "ELIF")]
#[case("{% if False %}IF{% elif True %}ELIF1{% elif True %}ELIF2{% else %}ELSE{% endif %}", "ELIF1")]
#[case("{% if False %}IF{% elif False %}ELIF{% endif %}", "")]
#[case(
    "{% if False %}IF{% elif True %}{% if True %}ELIF-IF{% else %}ELIF-ELSE{% endif %}{% else %}ELSE{% endif %}",
    "ELIF-IF"
)]
#[case(
    "{% if False %}IF{% elif True %}{% if False %}ELIF-IF{% elif True %}ELIF-ELIF{% else %}ELIF-ELSE{% endif %}{% else %}ELSE{% endif %}",
    "ELIF-ELIF"
)]
#[case(
    "{% if False %}IF{% elif True %}{% if False %}A{% elif True %}B{% else %}C{% endif %}{% else %}ELSE{% endif %}",
    "B"
)]
#[case(
    "{% if False %}..{% elif True %}{% if False %}..{% elif True %}{% if False %}..{% else %}ELIF-ELIF-ELSE{% endif %}{% else %}..{% endif %}{% else %}..{% endif %}",
    "ELIF-ELIF-ELSE"
)]
fn conditionals(#[case] template: &str, #[case] expected: &str) {
    assert_eq!(render(template, None), expected);
}

#[test]
fn condition_reads_data() {
    let mut data = Map::new();
    data.insert("flag".into(), Value::Bool(true));
    assert_eq!(
        render("{% if flag == True %}IF{% else %}ELSE{% endif %}", Some(&data)),
        "IF"
    );
}

#[rstest]
#[case("{% for item in basket %}{{item}}{% endfor %}", "AppleBananaCherry")]
#[case(
    "{% for item in basket %}{% if item != 'Banana' %}{{item}}{% endif %}{% endfor %}",
    "AppleCherry"
)]
#[case(
    "{% if True %}{% for item in basket %}{{item}}{% endfor %}{% endif %}",
    "AppleBananaCherry"
)]
#[case("{% if False %}{% for item in basket %}{{item}}{% endfor %}{% endif %}", "")]
#[case("{% for item in basket %}{{ item[0] }}{% endfor %}", "ABC")]
fn loops(#[case] template: &str, #[case] expected: &str) {
    assert_eq!(render(template, Some(&basket())), expected);
}

#[rstest]
#[case::missing("{% for x in nothing %}x{% endfor %}")]
#[case::empty_list("{% for x in empty %}x{% endfor %}")]
#[case::number("{% for x in count %}x{% endfor %}")]
#[case::string("{% for x in word %}x{% endfor %}")]
#[case::bad_expression("{% for x in 1 + %}x{% endfor %}")]
fn non_iterable_collections_render_nothing(#[case] template: &str) {
    let mut data = Map::new();
    data.insert("empty".into(), Value::Array(vec![]));
    data.insert("count".into(), Value::Int(3));
    data.insert("word".into(), Value::from("abc"));
    assert_eq!(render(template, Some(&data)), "");
}

#[test]
fn nested_loops_see_only_their_own_scope() {
    let mut data = Map::new();
    data.insert(
        "rows".into(),
        Value::Array(vec![Value::from(vec![1i64, 2]), Value::from(vec![3i64])]),
    );
    data.insert("title".into(), Value::from("T"));

    assert_eq!(
        render(
            "{{ title }}:{% for row in rows %}[{% for cell in row %}{{ cell }}{{ title }}{% endfor %}]{% endfor %}",
            Some(&data)
        ),
        "T:[12][3]"
    );
}

#[test]
fn loop_over_map_keys() {
    let mut inner = Map::new();
    inner.insert("b".into(), Value::Int(2));
    inner.insert("a".into(), Value::Int(1));
    let mut data = Map::new();
    data.insert("m".into(), Value::Map(inner));

    assert_eq!(render("{% for k in m %}{{ k }}{% endfor %}", Some(&data)), "ab");
}

#[test]
fn prints_literals_and_degrades_unknowns() {
    assert_eq!(
        render(
            "{{ '...string...' }}{{ None }}-{{ True }}-{{ [1,2,3] }}{{ 존재하지않는변수 }}",
            None
        ),
        "...string...None-True-"
    );
}

#[test]
fn none_literal_prints_but_missing_names_stay_empty() {
    assert_eq!(render("[{{ None }}][{{ missing }}][{{ 1e3 }}]", None), "[None][][1000.0]");
}

#[test]
fn long_operator_chain_renders_empty_instead_of_overflowing() {
    let chain = vec!["1"; 300_000].join(" + ");
    let template = compile(&format!("[{{{{ {chain} }}}}]")).unwrap();
    assert_eq!(template.render(None), "[]");

    let condition = vec!["True"; 300_000].join(" and ");
    let template = compile(&format!("{{% if {condition} %}}Y{{% else %}}N{{% endif %}}")).unwrap();
    assert_eq!(template.render(None), "N");
}

#[rstest]
#[case("{% if 1 < 2 < 3 %}Y{% else %}N{% endif %}", "Y")]
#[case("{% if 1 < 3 < 2 %}Y{% else %}N{% endif %}", "N")]
#[case("{% if 0 <= 0 < 1 == 1 %}Y{% else %}N{% endif %}", "Y")]
fn chained_comparisons(#[case] template: &str, #[case] expected: &str) {
    assert_eq!(render(template, None), expected);
}

#[rstest]
#[case::repeated_else("{% if x %}A{% else %}B{% else %}C{% endif %}", "BC")]
#[case::closer_with_argument("{% if True %}A{% endif x %}", "A")]
#[case::else_with_argument("{% if x %}A{% else whatever %}B{% endif %}", "B")]
#[case::else_inside_for(
    "{% if True %}{% for x in basket %}{{ x }}{% else %}-{% endfor %}{% endif %}",
    "Apple-Banana-Cherry-"
)]
#[case::elif_inside_for("{% for x in basket %}{{ x }}{% elif True %};{% endfor %}", "Apple;Banana;Cherry;")]
fn lenient_block_markers(#[case] template: &str, #[case] expected: &str) {
    assert_eq!(render(template, Some(&basket())), expected);
}

#[test]
fn comments_are_dropped() {
    assert_eq!(render("a{# hidden text #}b", None), "ab");
}

#[test]
fn text_without_tags_is_returned_trimmed_every_time() {
    let template = compile("  \n Hello, world!\n ").unwrap();
    assert_eq!(template.render(None), "Hello, world!");
    assert_eq!(template.render(None), "Hello, world!");
}

#[test]
fn special_characters_and_unicode_pass_through() {
    let mut data = Map::new();
    data.insert("content".into(), Value::from("Hello <world> & \"friends\" こんにちは 🌍"));
    assert_eq!(
        render("{{ content }}", Some(&data)),
        "Hello <world> & \"friends\" こんにちは 🌍"
    );
}

#[test]
fn one_template_many_renders_without_leaking_state() {
    let template = compile("{% for item in basket %}{{ item }};{% endfor %}{{ who }}").unwrap();

    let mut first = basket();
    first.insert("who".into(), Value::from("first"));
    let mut second = Map::new();
    second.insert("basket".into(), Value::from(vec!["Kiwi"]));

    assert_eq!(template.render(Some(&first)), "Apple;Banana;Cherry;first");
    assert_eq!(template.render(Some(&second)), "Kiwi;");
    assert_eq!(template.render(None), "");
    assert_eq!(template.render(Some(&first)), "Apple;Banana;Cherry;first");
}

#[test]
fn compiled_template_is_shared_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Template>();

    let template = compile("{% for item in basket %}{{ item }}{% endfor %}").unwrap();
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4i64)
            .map(|i| {
                let template = &template;
                s.spawn(move || {
                    let mut data = Map::new();
                    data.insert("basket".into(), Value::from(vec![i, i + 1]));
                    template.render(Some(&data))
                })
            })
            .collect();
        let outputs: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(outputs, vec!["01", "12", "23", "34"]);
    });
}

#[test]
fn json_data() {
    let template = compile(
        "{% for user in users %}{% if user.admin %}{{ user.name }}{% endif %}{% endfor %}",
    )
    .unwrap();
    let data = serde_json::json!({
        "users": [
            {"name": "ada", "admin": true},
            {"name": "bob", "admin": false},
            {"name": "cy", "admin": true}
        ]
    });
    assert_eq!(template.render_serialize(&data), "adacy");
}
