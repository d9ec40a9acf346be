//! Static HTML pages.
//!
//! Templates carry `{{name}}` placeholders filled from the variables the
//! controller attaches to a page response. Values are HTML-escaped; an
//! unknown placeholder renders as nothing.

use safelock_core::Page;

const INDEX: &str = r#"<!DOCTYPE html>
<html>
<head>
<title>{{device}}</title>
</head>
<frameset rows="8%,*">
  <frame name="top" src="top_frame.html" />
  <frameset cols="30%,70%">
    <frame name="menu" src="menu_frame.html" />
    <frame name="main" src="safe/?status=1" />
  </frameset>
  <noframes>
    <body>Your browser does not support frames.</body>
  </noframes>
</frameset>
</html>
"#;

const TOP_FRAME: &str = r"<html>
<body>
<center><h1>{{device}} lock controls</h1></center>
</body>
</html>
";

const MENU_FRAME: &str = r#"<html>
<head>
  <base target="main">
  <title>{{device}} menu</title>
</head>
<body>
<center><h2>Menu</h2>
<form method=post action=safe/>
<input type=submit value=Status name=status>
<input type=submit value=Version name=version>
</form>
<hr>
<form method=post action=safe/>
Open safe door:<br>
<select name="duration">
  <option value="5">5 seconds</option>
  <option value="10">10 seconds</option>
  <option value="20">20 seconds</option>
  <option value="30">30 seconds</option>
  <option value="60">60 seconds</option>
</select>
<input type=submit value="Open Safe" name=open>
</form>
<hr>
<form method=post action=safe/>
Unlock password:<br>
<input type=password name=unlock size=40><br>
<input type=submit value="Test password" name=pwtest>
<input type=submit value="Unlock Once" name=unlock_1>
<input type=submit value="Unlock Permanent" name=unlock_all>
</form>
<hr>
<form method=post action=safe/>
Lock safe with new password:<br>
Password: <input type=password name=lock1 size=40><br>
Repeat: <input type=password name=lock2 size=40><br>
<input type=submit value="Lock" name=lock>
</form>
<hr>
<form method=post action=safe/>
Firmware update mode:
<input type=submit value="on" name=update>
<input type=submit value="off" name=update>
</form>
<hr>
<a href="change_auth.html">Change safe authentication details</a>
</center>
</body>
</html>
"#;

const CHANGE_AUTH: &str = r"<html>
<body>
<form method=post action=safe/>
To set the user name and password needed to access {{device}}:
<br>
Username: <input name=username size=40>
<br>
Password: <input name=password size=40>
<br>
<input type=submit value='Set Auth Details' name=setauth>
<hr>
If the change is accepted, you will need to log in again.
</form>
</body>
</html>
";

const PROVISIONING: &str = r"<html>
<body>
<form method=post action=/safe/>
Configure {{device}}:
<br>
Safe name: <input name=safename size=40>
<br>
Relay pin: <input name=pin size=40>
<br>
WiFi SSID: <input name=ssid size=40>
<br>
WiFi password: <input name=password size=40>
<br>
<input type=submit value='Save' name=setwifi>
<hr>
If WiFi details are accepted, the safe restarts after 5 seconds.
</form>
</body>
</html>
";

fn template(page: Page) -> &'static str {
    match page {
        Page::Index => INDEX,
        Page::TopFrame => TOP_FRAME,
        Page::MenuFrame => MENU_FRAME,
        Page::ChangeAuth => CHANGE_AUTH,
        Page::Provisioning => PROVISIONING,
    }
}

/// Render `page` with `vars` substituted.
pub fn render(page: Page, vars: &[(&str, String)]) -> String {
    let source = template(page);
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let name = after[..end].trim();
        if let Some((_, value)) = vars.iter().find(|(key, _)| *key == name) {
            escape_into(&mut out, value);
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

fn escape_into(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
}
