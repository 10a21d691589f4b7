use chrono::TimeZone;

use super::*;

const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:idx="urn:atom-extension:indexing">
  <id>tag:google.com,2005:reader/user/000/state/com.google/alerts/111</id>
  <title>Google Alert - bocce</title>
  <link href="https://www.google.com/alerts/feeds/000/111" rel="self"></link>
  <updated>2026-01-02T10:00:00Z</updated>
  <entry>
    <id>tag:google.com,2013:googlealerts/feed:1234</id>
    <title type="html">Where to play &lt;b&gt;bocce&lt;/b&gt; in Chicago</title>
    <link href="https://www.google.com/url?rct=j&amp;sa=t&amp;url=https://blog.example.com/bocce-chicago%3Fref%3Drss&amp;ct=ga&amp;cd=CAEYAA&amp;usg=AOvVaw" />
    <published>2026-01-02T08:00:00Z</published>
    <updated>2026-01-02T08:00:00Z</updated>
    <content type="html">Looking for a &lt;b&gt;bocce&lt;/b&gt; league for our office team &amp;amp; friends</content>
    <author><name></name></author>
  </entry>
</feed>"#;

const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Community board</title>
    <item>
      <title>Team outing ideas?</title>
      <link>https://forum.example.com/t/42</link>
      <guid>forum-42</guid>
      <pubDate>Fri, 02 Jan 2026 09:00:00 +0000</pubDate>
      <description><![CDATA[<p>Anyone tried <b>bocce</b> for a team event?</p>]]></description>
    </item>
    <item>
      <title></title>
      <description></description>
    </item>
  </channel>
</rss>"#;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 2, 10, 0, 0).unwrap()
}

#[test]
fn parses_google_alerts_atom_entry() {
    let candidates = parse_feed(ATOM, now()).unwrap();
    assert_eq!(candidates.len(), 1);

    let c = &candidates[0];
    assert_eq!(c.source, SourceKind::GoogleAlerts);
    assert_eq!(c.title, "Where to play bocce in Chicago");
    assert_eq!(
        c.body,
        "Looking for a bocce league for our office team & friends"
    );
    assert_eq!(
        c.link.as_deref(),
        Some("https://blog.example.com/bocce-chicago?ref=rss")
    );
    assert_eq!(c.group_name.as_deref(), Some("bocce"));
    assert_eq!(c.age_hint.as_deref(), Some("2h ago"));
    assert_eq!(
        c.source_id.as_deref(),
        Some("tag:google.com,2013:googlealerts/feed:1234")
    );
}

#[test]
fn parses_rss_items_and_skips_empty_ones() {
    let candidates = parse_feed(RSS, now()).unwrap();
    assert_eq!(candidates.len(), 1);

    let c = &candidates[0];
    assert_eq!(c.title, "Team outing ideas?");
    assert_eq!(c.body, "Anyone tried bocce for a team event?");
    assert_eq!(c.link.as_deref(), Some("https://forum.example.com/t/42"));
    assert_eq!(c.group_name.as_deref(), Some("Community board"));
    assert_eq!(c.age_hint.as_deref(), Some("1h ago"));
}

#[test]
fn malformed_xml_is_an_error() {
    let result = parse_feed("<feed><entry><title>oops</entry></feed>", now());
    assert!(matches!(result, Err(SourceError::Xml(_))));
}

#[test]
fn strip_html_removes_tags_and_collapses_whitespace() {
    assert_eq!(
        strip_html("<p>Hello   <b>world</b></p>\n<br/>again&nbsp;&amp; again"),
        "Hello world again & again"
    );
}

#[test]
fn unwrap_google_redirect_handles_non_redirects() {
    assert_eq!(
        unwrap_google_redirect("https://example.com/a?b=c"),
        "https://example.com/a?b=c"
    );
    assert_eq!(
        unwrap_google_redirect("https://www.google.com/url?q=https%3A%2F%2Fexample.com%2Fx&sa=U"),
        "https://example.com/x"
    );
    assert_eq!(
        unwrap_google_redirect("https://www.google.com/url?sa=U"),
        "https://www.google.com/url?sa=U"
    );
}
